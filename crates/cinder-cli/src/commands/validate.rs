//! Effect validation command

use anyhow::{Context, Result};
use cinder_fx::prototype::EmitterPrototype;
use cinder_fx::Prototype;

pub fn run(path: &str, format: &str) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path))?;
    let proto = Prototype::from_bytes(&data).with_context(|| format!("parsing {}", path))?;

    if format == "json" {
        print_json(&proto);
    } else {
        print_text(&proto);
    }

    Ok(())
}

fn print_text(proto: &Prototype) {
    println!("Effect '{}': {} emitter(s)", proto.name, proto.emitter_count());

    for (index, emitter) in proto.emitters.iter().enumerate() {
        println!(
            "  [{}] '{}' {} {}, {} space, duration {}s, up to {} particle(s)",
            index,
            emitter.id,
            lowercase_debug(&emitter.geometry),
            lowercase_debug(&emitter.mode),
            lowercase_debug(&emitter.space),
            emitter.duration,
            emitter.max_particle_count,
        );
        println!(
            "      tile source '{}', animation '{}' ({}), material '{}'",
            emitter.tile_source, emitter.animation, emitter.animation_hash, emitter.material
        );

        let curves = authored_curves(emitter);
        if curves.is_empty() {
            println!("      no curves authored");
        } else {
            println!("      curves: {}", curves.join(", "));
        }
    }
}

fn print_json(proto: &Prototype) {
    let emitters: Vec<serde_json::Value> = proto
        .emitters
        .iter()
        .enumerate()
        .map(|(index, e)| {
            serde_json::json!({
                "index": index,
                "id": e.id,
                "mode": lowercase_debug(&e.mode),
                "space": lowercase_debug(&e.space),
                "geometry": lowercase_debug(&e.geometry),
                "tile_source": e.tile_source,
                "animation": e.animation,
                "animation_hash": e.animation_hash.to_string(),
                "material": e.material,
                "duration": e.duration,
                "max_particle_count": e.max_particle_count,
                "curves": authored_curves(e),
            })
        })
        .collect();

    let output = serde_json::json!({
        "name": proto.name,
        "emitters": emitters,
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

fn lowercase_debug<T: std::fmt::Debug>(value: &T) -> String {
    format!("{:?}", value).to_lowercase()
}

fn authored_curves(emitter: &EmitterPrototype) -> Vec<&'static str> {
    let p = &emitter.properties;
    let pp = &emitter.particle_properties;
    let slots = [
        ("spawn_rate", p.spawn_rate.is_some()),
        ("size_x", p.size_x.is_some()),
        ("size_y", p.size_y.is_some()),
        ("size_z", p.size_z.is_some()),
        ("particle_life_time", p.particle_life_time.is_some()),
        ("particle_speed", p.particle_speed.is_some()),
        ("particle_size", p.particle_size.is_some()),
        ("particle_alpha", p.particle_alpha.is_some()),
        ("particle_rotation", p.particle_rotation.is_some()),
        ("over_life scale", pp.scale.is_some()),
        ("over_life alpha", pp.alpha.is_some()),
        ("over_life rotation", pp.rotation.is_some()),
    ];

    slots
        .into_iter()
        .filter_map(|(name, authored)| authored.then_some(name))
        .collect()
}
