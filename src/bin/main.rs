//! Builds an [`AvlMap`] from a sequence of operations and prints its Graphviz rendering.
//!
//! Each argument is a key: `5` or `+5` inserts 5, `-5` removes it. With no arguments, inserts
//! `1..=7` in ascending order.
//!
//! ```text
//! cargo run -- 5 3 8 1 4 -3 | dot -Tsvg > tree.svg
//! ```

use std::process::ExitCode;

use cordyceps_avl::AvlMap;

enum Step {
    Insert(u32),
    Remove(u32),
}

fn parse(arg: &str) -> Option<Step> {
    match arg.strip_prefix('-') {
        Some(key) => key.parse().ok().map(Step::Remove),
        None => arg
            .strip_prefix('+')
            .unwrap_or(arg)
            .parse()
            .ok()
            .map(Step::Insert),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let steps = if args.is_empty() {
        (1..=7).map(Step::Insert).collect()
    } else {
        let mut steps = Vec::with_capacity(args.len());

        for arg in &args {
            match parse(arg) {
                Some(step) => steps.push(step),
                None => {
                    eprintln!("invalid step {arg:?}: expected a key, optionally prefixed by + or -");
                    return ExitCode::from(2);
                }
            }
        }

        steps
    };

    let mut map: AvlMap<u32, ()> = AvlMap::new();

    for step in steps {
        match step {
            Step::Insert(key) => {
                map.insert(key, ());
            }
            Step::Remove(key) => {
                map.remove(&key);
            }
        }

        map.assert_invariants();
    }

    let mut out = String::new();
    if let Err(err) = map.dotgraph("avl", &mut out) {
        eprintln!("failed to render tree: {err}");
        return ExitCode::FAILURE;
    }

    print!("{out}");
    eprintln!("{} keys, height {}", map.len(), map.height());

    ExitCode::SUCCESS
}
