//! Name hashing command

use anyhow::Result;
use cinder_core::NameHash;

pub fn run(name: &str) -> Result<()> {
    let hash = NameHash::of(name);
    println!("{:016x}  {}", hash.raw(), name);
    Ok(())
}
