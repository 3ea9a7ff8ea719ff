use brainnet::hub::HubConfig;
use brainnet::network::NetworkConfig;
use brainnet::simulation::Simulation;

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "reward-demo" {
        run_reward_demo();
        return;
    }
    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    // Minimal demo:
    // - six regions plus a hub, Hebbian learning switched on
    // - a rotating region gets a kick every 25 ticks
    // - sensory input follows a slow sine pattern
    let cfg = NetworkConfig::default()
        .with_hub(HubConfig::default())
        .with_seed(7);
    let mut sim = match Simulation::new(cfg) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = sim.set_learning(Some("hebbian")) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let region_ids: Vec<String> = sim.network().regions().iter().map(|r| r.id.clone()).collect();

    for t in 0..600u32 {
        if t % 25 == 0 && !region_ids.is_empty() {
            let target = &region_ids[(t as usize / 25) % region_ids.len()];
            // Ids come from the network itself, so the lookup cannot miss.
            let _ = sim.stimulate(target, 1.0);
        }
        if t % 10 == 0 {
            let phase = t as f32 * 0.05;
            let input: Vec<f32> = (0..10).map(|i| (phase + i as f32 * 0.6).sin().max(0.0)).collect();
            let _ = sim.inject_input(&input);
        }

        sim.step();

        if t % 50 == 0 {
            print_status(&sim);
        }
    }
}

fn print_status(sim: &Simulation) {
    let snap = sim.snapshot();
    let stats = snap.network.stats;
    let busiest = snap
        .network
        .regions
        .iter()
        .max_by(|a, b| a.activity.total_cmp(&b.activity))
        .map(|r| r.id.as_str())
        .unwrap_or("-");
    let readout = snap
        .readout
        .as_ref()
        .map(|r| format!("{r:.2?}"))
        .unwrap_or_default();
    println!(
        "t={:4} active={:3} in_flight={:4} total_signals={:6} busiest={:<9} readout={}",
        stats.tick, stats.active_neurons, stats.signals_in_flight, stats.total_signals, busiest, readout
    );
}

fn print_help() {
    println!("brainnet (spiking region network demo)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- reward-demo");
    println!("  cargo run -- --help");
}

/// Reward the network whenever the motor region is busier than the sensory one.
fn run_reward_demo() {
    let cfg = NetworkConfig::default()
        .with_hub(HubConfig::default())
        .with_seed(21);
    let mut sim = match Simulation::new(cfg) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = sim.set_learning(Some("reward")) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let mean_weight = |sim: &Simulation| {
        let conns = sim.network().connections();
        if conns.is_empty() {
            0.0
        } else {
            conns.iter().map(|c| c.weight).sum::<f32>() / conns.len() as f32
        }
    };
    let before = mean_weight(&sim);

    for t in 0..400u32 {
        if t % 20 == 0 {
            let _ = sim.stimulate("sensory", 1.0);
            let _ = sim.stimulate("motor", 1.0);
        }
        sim.step();

        let state = sim.network().get_state();
        let motor = state.region("motor").map_or(0.0, |r| r.activity);
        let sensory = state.region("sensory").map_or(0.0, |r| r.activity);
        if t % 20 == 19 {
            let reward = if motor > sensory { 1.0 } else { -0.5 };
            sim.apply_reward(reward);
        }

        if t % 100 == 0 {
            print_status(&sim);
        }
    }

    println!("mean weight: before={:.4} after={:.4}", before, mean_weight(&sim));
}
