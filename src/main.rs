// Copyright @yucwang 2026

use std::env;

use madeleine::core::value_selector::ValueSelector;
use madeleine::io::volume_loader::load_volume;
use madeleine::math::constants::{Float, Vector3f};
use madeleine::math::range::Range1f;
use madeleine::{Context, Result, VklError, Volume};

struct Options {
    input: String,
    origin: Option<Vector3f>,
    direction: Vector3f,
    t_min: Float,
    t_max: Float,
    ranges: Vec<Range1f>,
    isovalues: Vec<Float>,
}

fn parse_floats(value: Option<&String>, count: usize, flag: &str) -> Result<Vec<Float>> {
    let raw = value.ok_or_else(|| VklError::Parse(format!("{} needs a value", flag)))?;
    let parts = raw
        .split(',')
        .map(|s| s.trim().parse::<Float>().map_err(|_| VklError::Parse(format!("invalid {} value: {}", flag, raw))))
        .collect::<Result<Vec<Float>>>()?;
    if parts.len() != count {
        return Err(VklError::Parse(format!("{} expects {} comma-separated numbers", flag, count)));
    }
    Ok(parts)
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options {
        input: args[1].clone(),
        origin: None,
        direction: Vector3f::new(1.0, 0.0, 0.0),
        t_min: 0.0,
        t_max: Float::MAX,
        ranges: Vec::new(),
        isovalues: Vec::new(),
    };

    let mut i = 2;
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        let value = args.get(i);
        match flag {
            "--origin" => {
                let v = parse_floats(value, 3, flag)?;
                options.origin = Some(Vector3f::new(v[0], v[1], v[2]));
            }
            "--dir" => {
                let v = parse_floats(value, 3, flag)?;
                options.direction = Vector3f::new(v[0], v[1], v[2]);
            }
            "--tmin" => options.t_min = parse_floats(value, 1, flag)?[0],
            "--tmax" => options.t_max = parse_floats(value, 1, flag)?[0],
            "--range" => {
                let v = parse_floats(value, 2, flag)?;
                options.ranges.push(Range1f::new(v[0], v[1]));
            }
            "--iso" => options.isovalues.push(parse_floats(value, 1, flag)?[0]),
            other => {
                log::warn!("ignoring unknown argument {}", other);
                continue;
            }
        }
        i += 1;
    }
    Ok(options)
}

fn run(options: &Options) -> Result<()> {
    let volume = load_volume(&options.input)?.commit()?;
    let bounds = volume.bounding_box()?;
    let range = volume.value_range()?;
    println!("volume: {}", volume.type_name());
    println!("bounds: {:?} .. {:?}", bounds.p_min.as_slice(), bounds.p_max.as_slice());
    println!("value range: [{}, {}]", range.lower, range.upper);

    // Default ray: from just outside the low x face, through the centre.
    let origin = options.origin.unwrap_or_else(|| {
        let c = bounds.center();
        Vector3f::new(bounds.p_min.x - 1.0, c.y, c.z)
    });
    let t_range = Range1f::new(options.t_min, options.t_max);

    let ctx = Context::default();
    let mut selector = ValueSelector::new();
    selector.set_ranges(&options.ranges)?;
    selector.set_values(&options.isovalues)?;
    selector.commit();

    println!("intervals:");
    let intervals = ctx.init_interval_iterator(volume.as_ref(), origin, options.direction, t_range, Some(&selector))?;
    for interval in intervals {
        println!(
            "  t [{:.6}, {:.6}]  value [{}, {}]  dt {:.6}",
            interval.t_range.lower,
            interval.t_range.upper,
            interval.value_range.lower,
            interval.value_range.upper,
            interval.nominal_delta_t
        );
    }

    if !options.isovalues.is_empty() {
        println!("hits:");
        let hits = ctx.init_hit_iterator(volume.as_ref(), origin, options.direction, t_range, Some(&selector))?;
        for hit in hits {
            println!("  t {:.6}  sample {}  epsilon {:e}", hit.t, hit.sample, hit.epsilon);
        }
    }

    let sampler = ctx.new_sampler(volume.as_ref())?;
    println!("sample at {:?}: {}", origin.as_slice(), sampler.compute_sample(&origin));
    match sampler.compute_gradient(&origin) {
        Ok(g) => println!("gradient at {:?}: {:?}", origin.as_slice(), g.as_slice()),
        Err(e) => println!("gradient unavailable: {}", e),
    }

    if let Ok(observer) = ctx.new_observer(volume.as_ref(), "LeafNodeAccess") {
        println!("leaf accesses: {:?}", observer.read());
    }
    Ok(())
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <volume.xml> [--origin x,y,z] [--dir x,y,z] [--tmin a] [--tmax b] [--range lo,hi]... [--iso v]...",
            args[0]
        );
        std::process::exit(1);
    }

    let result = parse_args(&args).and_then(|options| run(&options));
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
