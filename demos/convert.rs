use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tgconv::{ApiProfile, SessionManager};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Telethon,
    Pyrogram,
    Tdata,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source format
    #[arg(value_enum)]
    from: Format,

    /// Source path (.session file or tdata folder)
    input: PathBuf,

    /// Target format (omit to only inspect the source)
    #[arg(value_enum)]
    to: Option<Format>,

    /// Target path
    output: Option<PathBuf>,

    /// Local passcode for tdata input (if set)
    #[arg(short, long)]
    passcode: Option<String>,

    /// API profile for defaults the target format may need
    #[arg(long, default_value = "desktop")]
    profile: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let profile: ApiProfile = args.profile.parse()?;

    let manager = match args.from {
        Format::Telethon => SessionManager::from_telethon_file(&args.input)?,
        Format::Pyrogram => SessionManager::from_pyrogram_file(&args.input)?,
        Format::Tdata => SessionManager::from_tdata_folder(&args.input, args.passcode.as_deref())?,
    }
    .with_api_profile(profile);

    let info = manager.summary();
    println!("Loaded session from {:?}", args.input);
    println!("  DC ID:    {}", info.dc_id);
    println!("  Key:      {}", info.auth_key_fingerprint);
    if let Some(user_id) = info.user_id {
        println!("  User ID:  {}", user_id);
    }
    if let Some(api_id) = info.api_id {
        println!("  API ID:   {}", api_id);
    }

    if let (Some(to), Some(output)) = (args.to, args.output) {
        match to {
            Format::Telethon => manager.to_telethon_file(&output)?,
            Format::Pyrogram => manager.to_pyrogram_file(&output)?,
            Format::Tdata => manager.to_tdata_folder(&output, None)?,
        }
        println!("Wrote {:?}", output);
    }

    Ok(())
}
