use std::{
    error::Error,
    io::{self, BufRead},
    thread,
    time::Duration,
};

use chanticleer::{
    config::Config,
    notify::{BackgroundNotifier, DesktopNotifier, LogNotifier, Notification, Notifier},
    parse_time_of_day,
    playback::{Player, RodioPlayer, SilentPlayer},
    time_source::SystemClock,
    AlarmEngine, AlarmStore, FileStore, TriggerController,
};
use clap::{Parser, Subcommand};

const APP_NAME: &str = "chanticleer";
const MAX_MINUTES: u32 = 59;
const MAX_DAY: u8 = 6;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ring without sound
    #[clap(long)]
    silent: bool,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write the default config
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// list the configured sounds
    Sounds,
    /// play a sound once to hear what it's like
    Preview {
        sound: String,
        #[clap(long, default_value_t = 5)]
        secs: u64,
    },
    /// list all alarms
    List,
    #[command(flatten)]
    Edit(Edit),
    /// watch the alarms until `quit`
    Run,
}

/// Changes to the alarms. Given on the command line, or typed into a
/// running `run`.
#[derive(Subcommand, Debug)]
enum Edit {
    /// add an alarm that goes off every HOURS:MINUTES
    AddInterval {
        hours: u32,
        minutes: u32,
        #[clap(long, short)]
        sound: Option<String>,
        #[clap(long, short, default_value = "")]
        label: String,
    },
    /// add an alarm that goes off at TIME (HH:MM) on the given days (0 is sunday)
    AddTime {
        time: String,
        #[clap(long, short, value_delimiter = ',', default_values_t = [0, 1, 2, 3, 4, 5, 6])]
        days: Vec<u8>,
        #[clap(long, short)]
        sound: Option<String>,
        #[clap(long, short, default_value = "")]
        label: String,
    },
    ToggleInterval {
        id: String,
    },
    ToggleTime {
        id: String,
    },
    DeleteInterval {
        id: String,
    },
    DeleteTime {
        id: String,
    },
}

/// a line typed into the `run` console
#[derive(Parser)]
#[command(no_binary_name = true)]
struct ConsoleLine {
    #[clap(subcommand)]
    edit: Edit,
}

/// shows ringing alarms on the terminal the engine runs in
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &Notification) -> chanticleer::Result<()> {
        println!(
            "⏰ {} {} (press enter to stop)",
            notification.title, notification.message
        );
        Ok(())
    }
}

fn open_engine(
    config: &Config,
    store: FileStore,
    player: impl Player + 'static,
    notifier: impl Notifier + 'static,
) -> AlarmEngine {
    let controller = TriggerController::new(config.sounds.clone(), player, notifier)
        .with_notification_duration(config.notification_duration());
    AlarmEngine::new(AlarmStore::open(store), controller, SystemClock)
}

fn default_sound(engine: &AlarmEngine) -> String {
    engine
        .controller()
        .sounds()
        .default_sound()
        .map(|sound| sound.id.clone())
        .unwrap_or_default()
}

fn report(found: bool, done: &str, kind: &str, id: &str) -> String {
    if found {
        format!("{done} [{id}]")
    } else {
        format!("no {kind} alarm {id}")
    }
}

/// Applies `edit`, refusing input that wouldn't make the alarm asked for.
fn apply(edit: Edit, engine: &mut AlarmEngine) -> Result<String, Box<dyn Error>> {
    match edit {
        Edit::AddInterval {
            hours,
            minutes,
            sound,
            label,
        } => {
            if minutes > MAX_MINUTES {
                return Err(format!("minutes go from 0 to {MAX_MINUTES}, got {minutes}").into());
            }
            if hours == 0 && minutes == 0 {
                return Err("the interval must be at least one minute".into());
            }
            let sound = sound.unwrap_or_else(|| default_sound(engine));
            let alarm = engine.add_interval_alarm(hours, minutes, sound, label);
            Ok(format!("added [{}] {alarm}", alarm.id))
        }
        Edit::AddTime {
            time,
            days,
            sound,
            label,
        } => {
            if let Some(day) = days.iter().find(|day| **day > MAX_DAY) {
                return Err(format!("days go from 0 (sunday) to {MAX_DAY}, got {day}").into());
            }
            let time = parse_time_of_day(&time)?;
            let sound = sound.unwrap_or_else(|| default_sound(engine));
            let alarm = engine.add_time_alarm(time, days, sound, label);
            Ok(format!("added [{}] {alarm}", alarm.id))
        }
        Edit::ToggleInterval { id } => Ok(report(
            engine.toggle_interval_alarm(&id),
            "toggled",
            "interval",
            &id,
        )),
        Edit::ToggleTime { id } => Ok(report(
            engine.toggle_time_alarm(&id),
            "toggled",
            "time",
            &id,
        )),
        Edit::DeleteInterval { id } => Ok(report(
            engine.delete_interval_alarm(&id),
            "deleted",
            "interval",
            &id,
        )),
        Edit::DeleteTime { id } => Ok(report(
            engine.delete_time_alarm(&id),
            "deleted",
            "time",
            &id,
        )),
    }
}

/// splits a console line on whitespace, "double quotes" keep words together
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                word.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(word);
    }
    words
}

fn print_alarms(engine: &AlarmEngine) {
    let on_off = |enabled: bool| if enabled { "on" } else { "off" };
    println!("interval alarms:");
    for alarm in engine.interval_alarms() {
        let last = alarm.last_triggered.map_or_else(
            || "never".to_string(),
            |last| last.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        println!(
            "  [{}] {} {} sound={} last={last} {}",
            alarm.id,
            alarm,
            on_off(alarm.enabled),
            alarm.sound,
            alarm.label
        );
    }
    println!("time alarms:");
    for alarm in engine.time_alarms() {
        println!(
            "  [{}] {} {} {} sound={} {}",
            alarm.id,
            alarm.time.format("%I:%M %p"),
            alarm.days_summary(),
            on_off(alarm.enabled),
            alarm.sound,
            alarm.label
        );
    }
    if let Some(active) = engine.active_alarm() {
        println!("ringing: [{}] {}", active.id(), active.headline());
    }
}

fn run(config: &Config, silent: bool) -> Result<(), Box<dyn Error>> {
    let store = FileStore::new(config.alarms_path()?);
    // held until shutdown, other writers have to go through the console
    let _lock = store.lock()?;
    println!("watching the alarms in {}", store.dir().display());

    let mut notifiers: Vec<Box<dyn Notifier>> =
        vec![Box::new(LogNotifier), Box::new(TerminalNotifier)];
    if config.desktop_notifications {
        notifiers.push(Box::new(DesktopNotifier::new(APP_NAME)));
    }
    // keeps a slow notification service from holding the engine lock
    let notifier = BackgroundNotifier::spawn(notifiers)?;
    let engine = if silent {
        open_engine(config, store, SilentPlayer::default(), notifier)
    } else {
        open_engine(config, store, RodioPlayer::spawn()?, notifier)
    };
    let engine = engine.shared();
    let scheduler = chanticleer::Scheduler::start(engine.clone(), config.tick_interval())?;

    println!("enter or `stop` dismisses a ringing alarm, `list` shows alarms, `quit` exits");
    println!("alarms are changed like on the command line, e.g. add-interval 0 25 -l \"tea break\"");
    for line in io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "" | "stop" => engine.lock().stop_alarm(),
            "list" => print_alarms(&engine.lock()),
            "quit" | "exit" => break,
            other => match ConsoleLine::try_parse_from(split_words(other)) {
                Ok(ConsoleLine { edit }) => match apply(edit, &mut engine.lock()) {
                    Ok(done) => println!("{done}"),
                    Err(e) => println!("{e}"),
                },
                Err(e) => println!("{e}"),
            },
        }
    }
    // stop ticking before the sound goes away
    scheduler.stop();
    engine.lock().stop_alarm();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("chanticleer").expect("couldn't initialize logger");

    let args = Args::parse();
    let config_path = Config::config_path()?;
    let config = Config::load(&config_path);

    match args.command {
        Some(Command::Init { force }) => {
            if force || !Config::is_config_present() {
                Config::new().save(&config_path)?;
                std::fs::create_dir_all(Config::sounds_path())?;
                println!("wrote {}", config_path.display());
                println!("put the sound files in {}", Config::sounds_path().display());
            } else {
                println!(
                    "{} already exists, use --force to overwrite",
                    config_path.display()
                );
            }
        }
        Some(Command::Sounds) => {
            for (i, sound) in config.sounds.iter().enumerate() {
                let default = if i == 0 { " (default)" } else { "" };
                println!("{}: {sound}{default}", sound.id);
            }
        }
        Some(Command::Preview { sound, secs }) => {
            let sound = config
                .sounds
                .resolve(&sound)
                .ok_or("no sounds configured")?;
            let mut player = RodioPlayer::spawn()?;
            let handle = player.play(sound, false)?;
            thread::sleep(Duration::from_secs(secs));
            player.stop(handle)?;
        }
        Some(Command::List) => {
            let store = FileStore::new(config.alarms_path()?);
            print_alarms(&open_engine(&config, store, SilentPlayer::default(), LogNotifier));
        }
        Some(Command::Edit(edit)) => {
            let store = FileStore::new(config.alarms_path()?);
            let _lock = store.lock()?;
            let mut engine = open_engine(&config, store, SilentPlayer::default(), LogNotifier);
            println!("{}", apply(edit, &mut engine)?);
        }
        Some(Command::Run) | None => run(&config, args.silent)?,
    }
    Ok(())
}
