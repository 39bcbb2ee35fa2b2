//! Knight's March - Entry Point
//!
//! Loads the configuration, spawns the agent threads and drives the march
//! either from the console or headless with the autopilot.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use knights_march::battle::{AutoPilot, BattleCommand, BattleView, CommandSource, TurnBattle};
use knights_march::core::config::{SimulationConfig, TimingConfig};
use knights_march::core::error::Result;
use knights_march::simulation::{AutoAdvance, Orchestrator, StepDecision, StepInput, StepView};

/// Knight's March - a step-synchronized march through hostile lands
#[derive(Parser, Debug)]
#[command(name = "knights-march")]
#[command(about = "March a knight toward the wizard while thieves and creatures close in")]
struct Args {
    /// TOML configuration file (defaults apply to anything missing)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Random seed override
    #[arg(long)]
    seed: Option<u64>,

    /// Length of the march override
    #[arg(long)]
    max_steps: Option<u32>,

    /// Play headless: always advance and let the autopilot fight
    #[arg(long)]
    auto: bool,

    /// Use short timings (no pacing delays)
    #[arg(long)]
    brisk: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("knights_march=info")),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.world.seed = seed;
    }
    if let Some(max_steps) = args.max_steps {
        config.world.max_steps = max_steps;
    }
    if args.brisk {
        config.timing = TimingConfig::brisk();
    }

    let outcome = if args.auto {
        let executor = Box::new(TurnBattle::new(AutoPilot::new()));
        let mut sim = Orchestrator::new(config, executor)?;
        let outcome = sim.run(&mut AutoAdvance::new())?;
        report(&sim, args.json)?;
        outcome
    } else {
        print_banner(&config);
        let executor = Box::new(TurnBattle::new(ConsoleCommands::default()));
        let mut sim = Orchestrator::new(config, executor)?;
        let outcome = sim.run(&mut ConsoleSteps)?;
        report(&sim, args.json)?;
        outcome
    };

    tracing::info!(?outcome, "Knight's March finished");
    Ok(())
}

fn print_banner(config: &SimulationConfig) {
    println!("\n=== KNIGHT'S MARCH ===");
    println!("Reach step {} and face what waits there.", config.world.max_steps);
    println!();
    println!("Commands:");
    println!("  <enter>       - March one step");
    println!("  wait / w      - Hold position while the world moves");
    println!("  quit / q      - Abandon the march");
    println!();
}

fn report(sim: &Orchestrator, json: bool) -> Result<()> {
    let summary = sim.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n=== JOURNEY'S END ===");
    println!("Outcome: {:?}", summary.outcome);
    println!("Steps: {}  Battles: {}", summary.steps, summary.battles);
    println!(
        "{} reached level {} with {} gold ({}/{} hp)",
        summary.player.name,
        summary.player.level,
        summary.player.gold,
        summary.player.vitals.health,
        summary.player.vitals.max_health
    );
    let record = &summary.player.record;
    println!("Won {}, lost {}, fled {}", record.won, record.lost, record.fled);
    if let Some((kind, count)) = &summary.most_defeated {
        println!("Most defeated: {} ({})", kind, count);
    }
    Ok(())
}

fn read_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    Ok((read > 0).then(|| line.trim().to_lowercase()))
}

/// Step decisions typed at the console
struct ConsoleSteps;

impl StepInput for ConsoleSteps {
    fn decide(&mut self, view: &StepView) -> Result<StepDecision> {
        println!(
            "\nStep {} | position {}/{} | hp {}/{} | level {} | gold {}",
            view.step,
            view.position,
            view.max_steps,
            view.vitals.health,
            view.vitals.max_health,
            view.level,
            view.gold
        );
        for enemy in &view.roster {
            let frozen = if enemy.frozen_turns > 0 { " (stunned)" } else { "" };
            println!("  {} at step {}{}", enemy.name, enemy.position, frozen);
        }

        loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = read_line()? else {
                return Ok(StepDecision::Quit);
            };
            match line.as_str() {
                "" => return Ok(StepDecision::Advance),
                "w" | "wait" => return Ok(StepDecision::Wait),
                "q" | "quit" => return Ok(StepDecision::Quit),
                other => println!("Unknown command: {}", other),
            }
        }
    }
}

/// Battle commands typed at the console. Once stdin is gone the autopilot
/// finishes the fight.
#[derive(Default)]
struct ConsoleCommands {
    fallback: AutoPilot,
    closed: bool,
}

impl ConsoleCommands {
    fn prompt(&self, view: &BattleView) -> io::Result<Option<BattleCommand>> {
        println!("\n-- Round {} | hp {}/{} --", view.round, view.player.health, view.player.max_health);
        for foe in &view.foes {
            println!("  {} ({}/{} hp)", foe.name, foe.vitals.health, foe.vitals.max_health);
        }
        for (i, command) in BattleCommand::ALL.iter().enumerate() {
            println!("  {}. {}", i + 1, command.label());
        }

        loop {
            print!("battle> ");
            io::stdout().flush()?;
            let Some(line) = read_line()? else {
                return Ok(None);
            };
            let chosen = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| BattleCommand::ALL.get(i).copied())
                .or_else(|| {
                    BattleCommand::ALL
                        .iter()
                        .copied()
                        .find(|c| c.label().eq_ignore_ascii_case(&line))
                });
            match chosen {
                Some(command) => return Ok(Some(command)),
                None => println!("Choose 1-{} or a command name", BattleCommand::ALL.len()),
            }
        }
    }
}

impl CommandSource for ConsoleCommands {
    fn next_command(&mut self, view: &BattleView) -> BattleCommand {
        if !self.closed {
            match self.prompt(view) {
                Ok(Some(command)) => return command,
                Ok(None) => tracing::warn!("input closed, the autopilot takes over"),
                Err(err) => tracing::warn!(%err, "input failed, the autopilot takes over"),
            }
            self.closed = true;
        }
        self.fallback.next_command(view)
    }
}
