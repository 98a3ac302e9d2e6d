mod cli;
pub mod config;
pub mod devices;
pub mod gateway;
pub mod gemini;
pub mod media;
pub mod models;
pub mod poster;
pub mod store;
mod utils;
pub mod views;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{AiCommands, Cli, Commands, ConfigCommands};
use config::{AppConfig, ConfigStore};
use devices::{FileMicrophone, FixedLocation};
use gateway::AiGateway;
use gemini::GeminiClient;
use media::EncodedMedia;
use models::{GroundedText, Show, Vibe};
use store::{FileSlot, ShowStore, SNAPSHOT_SLOT};
use views::{
    album::NO_SHOWS, AiTools, AlbumDraft, InviteOutcome, MemoryState, RandomMemory, ShowForm,
    Timeline, TimelineState, ToolKind,
};

const NO_POSTER: &str = "Could not generate a poster. Please try again.";
const NO_EDIT: &str = "Could not edit the image. Please try again.";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_show(show: &Show) {
    println!("{}  [{}]", show.artist, show.vibe);
    println!("  {} @ {}", show.display_date(), show.location);
    println!("  id: {}  media: {}", show.id, show.media.len());
}

fn print_grounded(heading: &str, found: &GroundedText) {
    println!("{heading}:");
    println!("{}", found.text);
    if !found.citations.is_empty() {
        println!("Sources:");
        for citation in &found.citations {
            let title = if citation.title.is_empty() {
                &citation.uri
            } else {
                &citation.title
            };
            println!("  - {title} <{}>", citation.uri);
        }
    }
}

/// Writes a generated image when a destination was given, otherwise reports its size.
fn save_image(data_url: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            media::write_data_url(data_url, path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Saved image to {}", path.display());
        }
        None => {
            let image = EncodedMedia::parse_data_url(data_url)?;
            println!(
                "Generated {} image ({} base64 bytes). Pass --out to save it.",
                image.content_type,
                image.data.len()
            );
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn add_show(
    store: &mut ShowStore,
    gateway: &AiGateway,
    artist: Option<String>,
    date: Option<chrono::NaiveDate>,
    location: Option<String>,
    vibe: Vibe,
    media: Vec<PathBuf>,
    identify: bool,
    playlist: bool,
) -> anyhow::Result<()> {
    let mut form = ShowForm::new();
    form.artist = artist.unwrap_or_default();
    form.date = date;
    form.location = location.unwrap_or_default();
    form.vibe = vibe;

    let intake = form.attach_files(&media);
    for (path, err) in &intake.failed {
        println!("Skipped {}: {err}", path.display());
    }

    if identify {
        form.identify_artist(gateway, &intake).await;
        if let Some(status) = form.ai_status() {
            println!("{status}");
        }
    }
    if playlist {
        if let Some(suggestion) = form.suggest_playlist(gateway).await {
            print_grounded("Playlist", suggestion);
        }
    }

    match form.submit(store) {
        Ok((id, persisted)) => {
            println!("Saved show {id}");
            if let Some(warning) = persisted.warning() {
                println!("Warning: {warning}");
            }
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn show_timeline(store: &ShowStore, search: Option<String>) {
    let timeline = Timeline::with_search(search.unwrap_or_default());
    match timeline.project(store.shows()) {
        TimelineState::Entries(entries) => {
            for show in entries {
                print_show(show);
            }
        }
        empty => {
            if let Some((title, hint)) = empty.message() {
                println!("{title}\n{hint}");
            }
        }
    }
}

fn show_random(store: &ShowStore) {
    let mut memory = RandomMemory::new();
    match memory.current(store) {
        MemoryState::Showing(show) => {
            println!("A random memory:");
            print_show(show);
            if let Some(cover) = show.cover() {
                println!("  cover: {} ({} chars)", cover.kind.as_str(), cover.url.len());
            }
        }
        empty => {
            if let Some((title, hint)) = empty.message() {
                println!("{title}\n{hint}");
            }
        }
    }
}

fn build_album(
    store: &ShowStore,
    name: Option<String>,
    invites: Vec<String>,
    show: Option<String>,
) -> anyhow::Result<()> {
    let Some(mut draft) = AlbumDraft::new(store.shows()) else {
        let (title, hint) = NO_SHOWS;
        println!("{title}\n{hint}");
        return Ok(());
    };
    if let Some(name) = name {
        draft.rename(&name);
    }
    for friend in &invites {
        if !draft.invite(friend) {
            println!("Skipped invite for '{friend}'");
        }
    }
    if let Some(id) = show {
        if !draft.select_show(store.shows(), &id) {
            bail!("no saved show with id {id}");
        }
    }

    println!("Album: {}", draft.name());
    println!("Friends: {}", draft.invitees().join(", "));
    if let Some(selected) = draft.selected(store.shows()) {
        print_show(selected);
        for item in &selected.media {
            println!("  - {} {}", item.kind.as_str(), item.id);
        }
    }
    let InviteOutcome::Simulated { album, invitees } = draft.send_invites();
    println!("Invites for '{album}' sent to {invitees} friends (simulated).");
    Ok(())
}

async fn run_ai(tool: AiCommands, store: &ShowStore, gateway: AiGateway) -> anyhow::Result<()> {
    let mut tools = AiTools::new(gateway.clone(), store);
    match tool {
        AiCommands::Tools => {
            for _ in ToolKind::ALL {
                let kind = tools.carousel.current();
                println!("{:<20} {}", kind.title(), kind.description());
                tools.carousel.next();
            }
        }
        AiCommands::Poster {
            subject,
            aspect,
            out,
        } => {
            tools.open(ToolKind::Poster);
            if let Some(subject) = subject {
                tools.poster_subject = subject;
            }
            tools.aspect_ratio = aspect;
            tools.start_poster()?;
            match tools.poster.finish().await.cloned().flatten() {
                Some(url) => save_image(&url, out.as_deref())?,
                None => println!("{NO_POSTER}"),
            }
        }
        AiCommands::Dive { show, question } => {
            tools.open(ToolKind::DeepDive);
            if let Some(id) = show {
                if !tools.select_show(store, &id) {
                    bail!("no saved show with id {id}");
                }
            }
            if let Some(question) = question {
                tools.dive_question = question;
            }
            tools.start_deep_dive()?;
            if let Some(answer) = tools.dive.finish().await {
                println!("{answer}");
            }
        }
        AiCommands::Edit {
            image,
            instruction,
            out,
        } => {
            tools.open(ToolKind::MediaEditor);
            tools.select_image_for_edit(&image)?;
            if let Some(instruction) = instruction {
                tools.edit_instruction = instruction;
            }
            tools.start_edit()?;
            match tools.edit.finish().await.cloned().flatten() {
                Some(url) => save_image(&url, out.as_deref())?,
                None => println!("{NO_EDIT}"),
            }
        }
        AiCommands::Analyze { image } => {
            tools.open(ToolKind::MediaAnalyzer);
            tools.select_photo(&image)?;
            tools.start_analysis()?;
            if let Some(found) = tools.analysis.finish().await {
                print_grounded("Analysis", found);
            }
        }
        AiCommands::Frame { image } => {
            let frame = EncodedMedia::from_path(&image)?;
            println!("{}", gateway.analyze_video_frame(&frame).await);
        }
        AiCommands::Transcribe { audio } => {
            tools.open(ToolKind::Transcription);
            let mut microphone = FileMicrophone::new(&audio);
            if let Err(err) = tools.start_recording(&mut microphone) {
                let message = tools
                    .recording_error()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                bail!(message);
            }
            tools.stop_recording()?;
            if let Some(transcript) = tools.transcription.finish().await {
                println!("{transcript}");
            }
        }
    }
    tools.close();
    Ok(())
}

fn run_config(config_store: &ConfigStore, action: ConfigCommands) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Show => {
            let config = config_store.read();
            println!("{}", serde_json::to_string_pretty(&config)?);
            let credential = if config::api_key_from_env().is_some() {
                "set"
            } else {
                "not set"
            };
            println!("api key ({}): {credential}", config::API_KEY_ENV);
        }
        ConfigCommands::Set { key, value } => {
            let updated: AppConfig = config_store
                .update(|config| config.set(&key, &value))
                .map_err(anyhow::Error::msg)?;
            tracing::info!("config updated: {key}");
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }
    Ok(())
}

async fn dispatch(command: Commands, root: &Path) -> anyhow::Result<()> {
    let config_store = ConfigStore::load(root);
    let command = match command {
        Commands::Config { action } => return run_config(&config_store, action),
        command => command,
    };

    let config = config_store.read();
    let backend = GeminiClient::new(&config, config::api_key_from_env());
    let gateway = AiGateway::new(Arc::new(backend), config);
    let mut store = ShowStore::load(Box::new(FileSlot::new(root, SNAPSHOT_SLOT)));

    match command {
        Commands::Add {
            artist,
            date,
            location,
            vibe,
            media,
            identify,
            playlist,
        } => {
            add_show(
                &mut store, &gateway, artist, date, location, vibe, media, identify, playlist,
            )
            .await
        }
        Commands::Timeline { search } => {
            show_timeline(&store, search);
            Ok(())
        }
        Commands::Random => {
            show_random(&store);
            Ok(())
        }
        Commands::Album {
            name,
            invites,
            show,
        } => build_album(&store, name, invites, show),
        Commands::Venues { lat, lon } => {
            let mut form = ShowForm::new();
            let here = FixedLocation::new(lat, lon);
            let found = form.lookup_venues(&here, &gateway).await;
            print_grounded("Nearby venues", found);
            Ok(())
        }
        Commands::Ai { tool } => run_ai(tool, &store, gateway).await,
        Commands::Config { .. } => Ok(()),
    }
}

pub fn run() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let root = cli.data_dir.clone().unwrap_or_else(utils::data_root);
    utils::ensure_parent(&utils::config_path(&root));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(dispatch(cli.command, &root))
}
