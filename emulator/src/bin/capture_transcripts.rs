use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Warmup)?;
    record_profile(TranscriptProfile::DebugPi)?;
    record_profile(TranscriptProfile::Tables)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::recording(profile)?;
    let script = match profile {
        TranscriptProfile::Warmup => WARMUP,
        TranscriptProfile::DebugPi => DEBUG_PI,
        TranscriptProfile::Tables => TABLES,
    };
    for command in script {
        let _ = session.handle_command(command)?;
    }
    println!("wrote {}", profile.log_path());
    Ok(())
}

const WARMUP: &[&str] = &[
    "tick",
    "status",
    "temp 20 20",
    "tick 40",
    "status",
    "temp 45 38",
    "tick 100",
    "status",
    "temp 70 70",
    "tick 200",
    "status",
];

const DEBUG_PI: &[&str] = &[
    "temp 45 45",
    "tick 40",
    "frame DPI1 1500 400 1000 30000 0 768 650 2500",
    "tick 2",
    "tick 100",
    "status",
    "frame DPI1 1500 800 2000 30000 0 768 650 2500",
    "tick 100",
    "status",
    "config pi1Kp",
    "frame DNRM",
    "tick 2",
    "status",
];

const TABLES: &[&str] = &[
    "tick",
    "config",
    "frame DTB1 150 180 210 240 700 900 1400 2000",
    "tick 2",
    "send hello",
    "tick",
    "frame DFON 100 110 600 0 100 110 600 1",
    "tick 2",
    "frame DBTN",
    "buttons 100",
    "tick 3",
    "buttons 000",
    "tick",
    "status",
    "tick 2400",
    "status",
];
