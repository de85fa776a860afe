//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the appropriate pipeline services.
//! Each handler takes CLI args, the wired [`App`] and Output, returns ExitCode.

use serde::Serialize;

use crate::app::{self, App};
use crate::cli::{
    CacheCmd, CommentsCmd, ExitCode, HistoryCmd, ManifestCmd, Output, ProgressCmd, ResolveCmd,
    SearchCmd, SkipCmd, SourcesCmd, StatusOk,
};
use crate::error::Error;
use crate::models::{
    CommentEvent, ContentIdentifier, HistoryItem, OriginHint, PlaySource, RawContentRecord,
    SkipPolicy,
};
use crate::registry::RegistryError;
use crate::stream::playback::checkpoint_key;

/// Print `data`, mapping a serialization failure to an error exit
fn emit<T: Serialize>(output: &Output, data: T) -> ExitCode {
    match output.print(data) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

fn emit_lines<T: Serialize>(output: &Output, data: T, lines: &[String]) -> ExitCode {
    match output.print_lines(data, lines) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

fn registry_error(output: &Output, e: RegistryError) -> ExitCode {
    let code = match e {
        RegistryError::NotFound(_) => ExitCode::NotFound,
        RegistryError::Protected(_) | RegistryError::InvalidEndpoint(_) => ExitCode::InvalidArgs,
        RegistryError::Store(_) => ExitCode::Error,
    };
    output.error(e.to_string(), code)
}

// =============================================================================
// Search Command
// =============================================================================

pub async fn search_cmd(cmd: SearchCmd, app: &App, output: &Output) -> ExitCode {
    output.info(format!("Searching for: {}", cmd.query));

    let mut results = app.resolver.search(&cmd.query).await;
    results.truncate(cmd.limit);

    let lines: Vec<String> = results
        .iter()
        .map(|hit| {
            let year = hit.year.as_deref().map(|y| format!(" [{}]", y)).unwrap_or_default();
            match &hit.origin_endpoint {
                Some(endpoint) => format!("{}  {}{}  ({})", hit.id, hit.title, year, endpoint),
                None => format!("{}  {}{}  (metadata)", hit.id, hit.title, year),
            }
        })
        .collect();
    emit_lines(output, &results, &lines)
}

// =============================================================================
// Resolve Command
// =============================================================================

/// Resolved content with its decoded play sources
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    /// Id the history and progress commands know this content by
    pub content_id: String,
    /// Episode to open: the last one opened, else the first
    pub episode_index: usize,
    pub primary: RawContentRecord,
    pub alternatives: Vec<RawContentRecord>,
    pub sources: Vec<PlaySource>,
}

/// Build the identifier described by the resolve arguments
pub fn identifier_for(cmd: &ResolveCmd) -> ContentIdentifier {
    let mut id = if cmd.scraped {
        ContentIdentifier::new(cmd.id.trim(), OriginHint::Scraped)
    } else {
        ContentIdentifier::parse(cmd.id.trim())
    };
    // A bare id given together with its backend is a catalog id
    if cmd.api.is_some() && !cmd.scraped {
        id.origin = OriginHint::Catalog;
    }
    if let Some(api) = &cmd.api {
        id = id.with_endpoint(api.trim());
    }
    if let Some(title) = &cmd.title {
        id = id.with_title(title.trim());
    }
    id
}

pub async fn resolve_cmd(cmd: ResolveCmd, app: &App, output: &Output) -> ExitCode {
    if cmd.id.trim().is_empty() {
        return output.error("Content id must not be empty", ExitCode::InvalidArgs);
    }
    let id = identifier_for(&cmd);
    output.info(format!("Resolving: {}", id.raw_id));

    let Some(mut resolved) = app.resolver.resolve(&id).await else {
        return output.error(
            format!("{} is temporarily unavailable on every backend", id.raw_id),
            ExitCode::NotFound,
        );
    };

    if cmd.enrich {
        app.resolver.metadata().enrich(&mut resolved.primary).await;
    }

    let sources = match app::play_sources(&resolved.primary) {
        Ok(sources) => sources,
        Err(e) => return output.error(e.to_string(), ExitCode::from(&e)),
    };

    let content_id = resolved.primary.catalog_id();
    let first_source = sources.first();
    let episode_index = app
        .history
        .last_episode(&content_id)
        .filter(|i| first_source.is_some_and(|s| *i < s.episodes.len()))
        .unwrap_or(0);
    app.history.add(HistoryItem {
        content_id: content_id.clone(),
        title: resolved.primary.title.clone(),
        poster_url: resolved.primary.poster_url.clone(),
        origin_endpoint: Some(resolved.primary.origin_endpoint.clone()),
        episode_index,
        episode_title: first_source
            .and_then(|s| s.episodes.get(episode_index))
            .map(|ep| ep.title.clone())
            .unwrap_or_default(),
        last_updated: 0,
    });

    let mut lines = vec![format!(
        "{}  {}  [{}]",
        content_id, resolved.primary.title, resolved.primary.origin_endpoint
    )];
    if episode_index > 0 {
        lines.push(format!("  continue at episode {}", episode_index + 1));
    }
    lines.extend(
        resolved
            .alternatives
            .iter()
            .map(|alt| format!("  alt: {} [{}]", alt.title, alt.origin_endpoint)),
    );
    for source in &sources {
        lines.push(format!("{} ({} episodes)", source.group_name, source.episodes.len()));
        lines.extend(source.episodes.iter().map(|ep| format!("  {}  {}", ep, ep.url)));
    }

    let response = ResolveResponse {
        content_id,
        episode_index,
        primary: resolved.primary,
        alternatives: resolved.alternatives,
        sources,
    };
    emit_lines(output, &response, &lines)
}

// =============================================================================
// Manifest Command
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ManifestWritten {
    pub status: &'static str,
    pub path: String,
    pub bytes: usize,
}

pub async fn manifest_cmd(cmd: ManifestCmd, app: &App, output: &Output) -> ExitCode {
    output.info(format!("Fetching manifest: {}", cmd.url));

    let manifest = match app.fetch_manifest(&cmd.url).await {
        Ok(text) => text,
        Err(e) => return output.error(format!("Manifest fetch failed: {}", e), ExitCode::from(&e)),
    };

    match cmd.output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &manifest) {
                return output.error(
                    format!("Failed to write {}: {}", path.display(), e),
                    ExitCode::Error,
                );
            }
            emit(
                output,
                ManifestWritten {
                    status: "ok",
                    path: path.display().to_string(),
                    bytes: manifest.len(),
                },
            )
        }
        None if output.json => emit(output, &manifest),
        None => {
            print!("{}", manifest);
            ExitCode::Success
        }
    }
}

// =============================================================================
// Comments Command
// =============================================================================

pub async fn comments_cmd(cmd: CommentsCmd, app: &App, output: &Output) -> ExitCode {
    let index = cmd.episode_index();
    output.info(format!("Matching comments for {} (episode {})", cmd.title, index + 1));

    let mut events: Vec<CommentEvent> = app.comments.resolve(&cmd.title, index).await;
    if events.is_empty() {
        let e = Error::NoCommentMatch(cmd.title.clone());
        return output.error(e.to_string(), ExitCode::from(&e));
    }
    if let Some(limit) = cmd.limit {
        events.truncate(limit);
    }

    let lines: Vec<String> = events
        .iter()
        .map(|ev| {
            format!(
                "{:>8.2}  {:?}  {}  {}",
                ev.time_offset_seconds, ev.display_mode, ev.color, ev.text
            )
        })
        .collect();
    emit_lines(output, &events, &lines)
}

// =============================================================================
// Progress Commands
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub key: String,
    pub position_seconds: Option<f64>,
}

pub fn progress_cmd(cmd: ProgressCmd, app: &App, output: &Output) -> ExitCode {
    match cmd {
        ProgressCmd::Save(save) => {
            let Some(position) = save.parse_position().filter(|p| *p > 0.0) else {
                return output.error(
                    format!("Invalid position: {}", save.position),
                    ExitCode::InvalidArgs,
                );
            };
            let key = checkpoint_key(&save.key.content, save.key.episode);
            app.checkpoints.save(&key, position);
            app.history.remember_episode(&save.key.content, save.key.episode);
            emit(
                output,
                ProgressResponse {
                    key,
                    position_seconds: Some(position),
                },
            )
        }
        ProgressCmd::Load(at) => {
            let key = checkpoint_key(&at.content, at.episode);
            let position = app.checkpoints.load(&key);
            if position.is_none() && !output.json {
                return output.error(format!("No checkpoint for {}", key), ExitCode::NotFound);
            }
            emit(
                output,
                ProgressResponse {
                    key,
                    position_seconds: position,
                },
            )
        }
        ProgressCmd::Clear(at) => {
            app.checkpoints.clear(&checkpoint_key(&at.content, at.episode));
            emit(output, StatusOk::default())
        }
    }
}

// =============================================================================
// Skip Command
// =============================================================================

pub fn skip_cmd(cmd: SkipCmd, app: &App, output: &Output) -> ExitCode {
    let current = app.checkpoints.skip_policy();
    let policy = SkipPolicy {
        intro_seconds: cmd.intro.unwrap_or(current.intro_seconds),
        outro_seconds: cmd.outro.unwrap_or(current.outro_seconds),
    };
    if policy != current {
        app.checkpoints.set_skip_policy(policy);
    }
    emit_lines(output, policy, &[policy.to_string()])
}

// =============================================================================
// Sources Commands
// =============================================================================

pub fn sources_cmd(cmd: SourcesCmd, app: &App, output: &Output) -> ExitCode {
    let registry = &app.registry;
    match cmd {
        SourcesCmd::List => {
            let backends = registry.list_all();
            let lines: Vec<String> = backends.iter().map(|b| format!("{}  {}", b.id, b)).collect();
            emit_lines(output, &backends, &lines)
        }
        SourcesCmd::Add { name, endpoint } => match registry.add(&name, &endpoint) {
            Ok(backend) => emit(output, backend),
            Err(e) => registry_error(output, e),
        },
        SourcesCmd::Remove { id } => match registry.remove(&id) {
            Ok(backend) => emit(output, backend),
            Err(e) => registry_error(output, e),
        },
        SourcesCmd::Toggle { id } => match registry.toggle(&id) {
            Ok(_) => emit(output, registry.get(&id)),
            Err(e) => registry_error(output, e),
        },
        SourcesCmd::Reset => emit(output, registry.reset()),
    }
}

// =============================================================================
// History and Cache Commands
// =============================================================================

pub fn history_cmd(cmd: HistoryCmd, app: &App, output: &Output) -> ExitCode {
    let items: Vec<HistoryItem> = match cmd {
        HistoryCmd::List => app.history.list(),
        HistoryCmd::Remove { content_id } => app.history.remove(&content_id),
        HistoryCmd::Clear => {
            app.history.clear();
            Vec::new()
        }
    };
    let lines: Vec<String> = items
        .iter()
        .map(|h| format!("{}  {}  {}", h.content_id, h.title, h.episode_title))
        .collect();
    emit_lines(output, &items, &lines)
}

#[derive(Debug, Serialize)]
pub struct CacheCleared {
    pub status: &'static str,
    pub removed: usize,
}

pub fn cache_cmd(cmd: CacheCmd, app: &App, output: &Output) -> ExitCode {
    match cmd {
        CacheCmd::Clear => {
            let removed = app.clear_cache();
            emit(
                output,
                CacheCleared {
                    status: "ok",
                    removed,
                },
            )
        }
    }
}
