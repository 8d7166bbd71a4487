use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use mathdrill_core::achievements::{counts, group_by_operation};
use mathdrill_core::config::DrillDefaults;
use mathdrill_core::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mathdrill")]
#[command(about = "Arithmetic practice with profiles and medals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Seed for question order and hints
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored profiles
    Profiles,

    /// Create a profile and make it current
    CreateProfile { name: String },

    /// Delete a profile by id
    DeleteProfile { id: String },

    /// Print the learning table
    Learn {
        #[command(flatten)]
        drill: DrillArgs,

        /// Hide answers
        #[arg(long)]
        hide_answers: bool,
    },

    /// Run a practice or test drill
    Drill {
        #[command(flatten)]
        drill: DrillArgs,

        /// practice or test
        #[arg(long, default_value = "practice")]
        phase: Phase,

        /// Profile id, or "guest"; defaults to the current profile
        #[arg(long)]
        profile: Option<String>,

        /// Comma-separated answers instead of reading stdin ("s" skips in a test)
        #[arg(long)]
        answers: Option<String>,

        /// Attempt the timed rainbow challenge
        #[arg(long)]
        rainbow: bool,
    },

    /// Show a profile's medals
    Achievements {
        /// Profile id; defaults to the current profile
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Args)]
struct DrillArgs {
    /// addition, subtraction, multiplication or division
    #[arg(long)]
    operation: Operation,

    /// Base number (ignored for square numbers)
    #[arg(long)]
    base: Option<i64>,

    /// First value of the range
    #[arg(long)]
    min: Option<i64>,

    /// Last value of the range
    #[arg(long)]
    max: Option<i64>,

    /// Square numbers (multiplication only)
    #[arg(long)]
    square: bool,
}

impl DrillArgs {
    /// Navigation snapshot for these arguments; out-of-bounds values are
    /// rejected rather than clamped
    fn to_nav(&self, phase: Phase, defaults: &DrillDefaults) -> Result<NavState> {
        let mut config = DrillConfig::new(
            self.operation,
            self.base.unwrap_or(defaults.base_number),
            self.min.unwrap_or(defaults.range_min),
            self.max.unwrap_or(defaults.range_max),
        );
        config.is_square_numbers = self.square && self.operation == Operation::Multiplication;
        config.validate()?;
        Ok(NavState::for_drill(phase, &config))
    }
}

fn main() -> Result<()> {
    // Keep prompts clean; RUST_LOG still overrides
    mathdrill_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }

    let store = FallbackStore::open(config.data.storage_path());
    if !store.is_durable() {
        eprintln!("Warning: storage unavailable, changes will not be saved");
    }

    let mut app = match cli.seed {
        Some(seed) => App::with_seed(store, config, seed),
        None => App::new(store, config),
    };

    match cli.command {
        Commands::Profiles => cmd_profiles(&app),
        Commands::CreateProfile { name } => cmd_create_profile(&mut app, &name),
        Commands::DeleteProfile { id } => cmd_delete_profile(&mut app, &id),
        Commands::Learn {
            drill,
            hide_answers,
        } => cmd_learn(&mut app, &drill, hide_answers),
        Commands::Drill {
            drill,
            phase,
            profile,
            answers,
            rainbow,
        } => cmd_drill(&mut app, &drill, phase, profile, answers, rainbow, cli.seed),
        Commands::Achievements { profile } => cmd_achievements(&app, profile),
    }
}

fn cmd_profiles(app: &App<FallbackStore>) -> Result<()> {
    tracing::info!("Listing profiles");
    let profiles = app.profiles().list();
    if profiles.is_empty() {
        println!("No profiles yet. Create one with `mathdrill create-profile <name>`.");
        return Ok(());
    }

    let current = app.profiles().current().map(|p| p.id);
    for profile in profiles {
        let marker = if current.as_deref() == Some(profile.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  {}  ({} tests, {} medals)",
            marker,
            profile.id,
            profile.name,
            profile.stats.len(),
            profile.achievements.len()
        );
    }
    Ok(())
}

fn cmd_create_profile(app: &mut App<FallbackStore>, name: &str) -> Result<()> {
    tracing::info!("Creating profile {:?}", name);
    let profile = app.profiles_mut().create(name, Utc::now())?;
    println!("✓ Created profile {} ({})", profile.name, profile.id);
    Ok(())
}

fn cmd_delete_profile(app: &mut App<FallbackStore>, id: &str) -> Result<()> {
    tracing::info!("Deleting profile {}", id);
    if !app.profiles_mut().delete(id) {
        return Err(Error::Profile(format!("No profile with id {}", id)));
    }
    println!("✓ Deleted profile {}", id);
    Ok(())
}

fn cmd_learn(app: &mut App<FallbackStore>, drill: &DrillArgs, hide_answers: bool) -> Result<()> {
    let nav = drill.to_nav(Phase::Learning, &app.config().drill)?;
    tracing::info!("Learning table: {}", nav.to_query());
    app.startup(&nav, Utc::now());

    let session = app.session_mut();
    if hide_answers {
        session.set_all_answers_visible(false);
    }
    for calc in session.calculations() {
        if calc.show_answer {
            println!("{} = {}", calc.question(), calc.answer);
        } else {
            println!("{} = ?", calc.question());
        }
    }
    Ok(())
}

fn cmd_drill(
    app: &mut App<FallbackStore>,
    drill: &DrillArgs,
    phase: Phase,
    profile: Option<String>,
    answers: Option<String>,
    rainbow: bool,
    seed: Option<u64>,
) -> Result<()> {
    if phase == Phase::Learning {
        return Err(Error::Other("Use `mathdrill learn` for the learning table".into()));
    }

    let mut nav = drill.to_nav(phase, &app.config().drill)?;
    nav.profile_id = profile.clone();
    nav.rainbow = rainbow;
    tracing::info!("Starting drill: {}", nav.to_query());

    let resolved = app.startup(&nav, Utc::now());
    if profile.is_some() && resolved.profile_id.is_none() {
        return Err(Error::Profile(format!(
            "No profile with id {}",
            profile.unwrap_or_default()
        )));
    }

    let total = app.session().calculations().len();
    if total == 0 {
        return Err(Error::Other("Empty range, nothing to drill".into()));
    }

    match app.profile() {
        Some(p) => println!("{} for {} ({} questions)", phase, p.name, total),
        None => println!("{} without a profile ({} questions)", phase, total),
    }
    if let Some(countdown) = app.countdown() {
        println!(
            "🌈 Rainbow challenge: {} seconds",
            countdown.duration.num_seconds()
        );
    }

    let mut input: Box<dyn Iterator<Item = io::Result<String>>> = match answers {
        Some(list) => Box::new(
            list.split(',')
                .map(|s| Ok(s.trim().to_string()))
                .collect::<Vec<_>>()
                .into_iter(),
        ),
        None => Box::new(io::stdin().lock().lines()),
    };

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    while !app.session().is_complete() {
        if app.tick(Utc::now()) {
            println!("⏱ Rainbow challenge timed out");
        }

        let Some(calc) = app.session().current().cloned() else {
            break;
        };
        print!(
            "[{}/{}] {} = ",
            app.session().current_index() + 1,
            total,
            calc.question()
        );
        io::stdout().flush()?;

        let Some(line) = input.next() else {
            println!();
            break;
        };
        let line = line?;
        let line = line.trim();
        tracing::debug!("Answer input {:?} for {}", line, calc.id);

        match line {
            "s" if phase == Phase::Test => {
                app.skip();
                println!("skipped");
            }
            "?" if phase == Phase::Practice => {
                let options = choices::options(calc.answer, &mut rng);
                let rendered: Vec<String> = options.iter().map(|v| v.to_string()).collect();
                println!("options: {}", rendered.join(" | "));
            }
            _ => match line.parse::<f64>() {
                Ok(value) => {
                    let expected = calc.answer;
                    let mut sink = |feedback: Feedback, _position: usize| match feedback {
                        Feedback::Correct => println!("✓"),
                        Feedback::Wrong => println!("✗ ({})", expected),
                    };
                    app.submit(value, Some(&mut sink as &mut dyn FeedbackSink));
                }
                Err(_) => println!("'{}' is not a number", line),
            },
        }
    }

    let progress = app.session().progress();
    if !app.session().is_complete() {
        println!(
            "Stopped after {} of {} questions",
            progress.completed, progress.total
        );
        return Ok(());
    }

    println!(
        "Score: {}/{} ({}%), mistakes: {}",
        progress.correct,
        progress.total,
        progress.accuracy_percent(),
        app.session().mistakes()
    );

    if phase == Phase::Test {
        match app.finish(Utc::now()) {
            Some(earned) if earned.is_empty() => println!("No new medals"),
            Some(earned) => {
                for achievement in earned {
                    println!(
                        "🏅 {} medal: {} base {}",
                        achievement.kind, achievement.operation, achievement.base_number
                    );
                }
            }
            None => println!("No profile selected, result not recorded"),
        }
    }

    Ok(())
}

fn cmd_achievements(app: &App<FallbackStore>, profile: Option<String>) -> Result<()> {
    tracing::info!(
        "Showing achievements for {}",
        profile.as_deref().unwrap_or("current profile")
    );
    let profile = match profile {
        Some(id) => app
            .profiles()
            .find(&id)
            .ok_or_else(|| Error::Profile(format!("No profile with id {}", id)))?,
        None => app
            .profiles()
            .current()
            .ok_or_else(|| Error::Profile("No current profile".into()))?,
    };

    let totals = counts(&profile.achievements);
    println!("{}", profile.name);
    println!(
        "  bronze: {}  silver: {}  gold: {}  rainbow: {}",
        totals.bronze, totals.silver, totals.gold, totals.rainbow
    );

    let groups = group_by_operation(&profile.achievements);
    for operation in Operation::ALL {
        let earned = groups.for_operation(operation);
        if earned.is_empty() {
            continue;
        }
        println!("  {}:", operation);
        for achievement in earned {
            println!(
                "    {} base {} ({} questions)",
                achievement.kind, achievement.base_number, achievement.total_questions
            );
        }
    }
    if !groups.rainbow.is_empty() {
        println!("  rainbow:");
        for achievement in &groups.rainbow {
            println!("    base {}", achievement.base_number);
        }
    }
    Ok(())
}
