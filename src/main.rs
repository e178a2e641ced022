//! The CLI collaborator: `compute`, `serve`, and `stats`. A thin adapter
//! over `teeko_core`'s public contract — no solver logic lives here.

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flexi_logger::Logger;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use teeko_core::db::Database;
use teeko_core::drop_solver::solve_drop_phase;
use teeko_core::goedel::CONFIGS;
use teeko_core::lookup::{lookup, Lookup, LookupError, Phase, Turn};
use teeko_core::play_solver::{solve_play_phase, PLAY_LAYER};
use teeko_core::position_cache::PositionCache;
use teeko_core::score::{Outcome, Score, SCORE_A_WIN, SCORE_B_WIN, SCORE_TIE};
use teeko_core::symmetry::SymmetryIndex;

#[derive(Parser)]
#[command(name = "teeko", about = "Compute, serve, and inspect a strong Teeko solution")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the full solution and write it to a database file.
    Compute {
        #[arg(long, default_value = "teeko.tdb")]
        db: PathBuf,
        /// Number of rayon worker threads; defaults to available parallelism.
        #[arg(long)]
        threads: Option<usize>,
        /// Skip the draw-heuristic pass, leaving unresolved ties as plain 0s.
        #[arg(long)]
        no_heuristic: bool,
        /// Write the D4-canonical compressed format instead of the dense one.
        #[arg(long)]
        compress: bool,
    },
    /// Memory-map a database and serve lookups over HTTP.
    Serve {
        #[arg(long, default_value = "teeko.tdb")]
        db: PathBuf,
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
    /// Print per-layer draw/win/loss counts for a solved database.
    Stats {
        #[arg(long, default_value = "teeko.tdb")]
        db: PathBuf,
        /// Also report the longest forced win found in each layer (slow, diagnostic only).
        #[arg(long)]
        longest_wins: bool,
    },
}

fn main() -> Result<()> {
    let log_spec = std::env::var("TEEKO_LOG").unwrap_or_else(|_| "info".to_string());
    let _logger = Logger::try_with_env_or_str(&log_spec)
        .context("initializing logger")?
        .log_to_stderr()
        .start()
        .context("starting logger")?;

    let cli = Cli::parse();
    match cli.command {
        Command::Compute { db, threads, no_heuristic, compress } => {
            cmd_compute(&db, threads, !no_heuristic, compress)
        }
        Command::Serve { db, addr } => cmd_serve(&db, &addr),
        Command::Stats { db, longest_wins } => cmd_stats(&db, longest_wins),
    }
}

fn cmd_compute(db_path: &Path, threads: Option<usize>, use_heuristic: bool, compress: bool) -> Result<()> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("configuring rayon thread pool")?;
    }

    let phases = ProgressBar::new(if compress { 4 } else { 3 });
    phases.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap()
            .progress_chars("=> "),
    );

    phases.set_message("building position cache");
    let cache8 = PositionCache::build(PLAY_LAYER);
    log::info!("layer 8 position cache: {} positions", cache8.len());
    phases.inc(1);

    phases.set_message("solving play phase");
    log::info!("starting play-phase retrograde analysis");
    let play_table = solve_play_phase(&cache8, use_heuristic);
    log::debug!("play-phase layer done: {} scores", play_table.len());
    phases.inc(1);

    phases.set_message("solving drop phase");
    let tables = solve_drop_phase(play_table);
    log::info!("initial position score: {}", tables[0][0]);
    phases.inc(1);

    let database = Database::from_tables(tables);

    if compress {
        phases.set_message("compressing (D4 symmetry)");
        let indices: Vec<SymmetryIndex> = (0..9u8).map(SymmetryIndex::build).collect();
        let indices: [SymmetryIndex; 9] = indices
            .try_into()
            .unwrap_or_else(|_| unreachable!("exactly 9 layers"));
        for (n, index) in indices.iter().enumerate() {
            log::debug!(
                "layer {n}: {} of {} positions canonical",
                index.canonical_count(),
                CONFIGS[n]
            );
        }
        database.save_compressed(db_path, &indices)?;
        phases.inc(1);
    } else {
        database.save_uncompressed(db_path)?;
    }
    phases.finish_with_message("done");

    log::info!("saved database to {}", db_path.display());
    Ok(())
}

fn cmd_serve(db_path: &Path, addr: &str) -> Result<()> {
    log::info!("mmapping {}", db_path.display());
    let database = Arc::new(Database::open(db_path)?);

    let server = tiny_http::Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    log::info!("listening on {addr}");

    for mut request in server.incoming_requests() {
        let response_body = match handle_query(&database, &mut request) {
            Ok(body) => body,
            Err(err) => {
                log::warn!("request failed: {err}");
                serde_json::to_string(&QueryResponse::error(err.to_string()))
                    .unwrap_or_else(|_| "{\"error\":\"internal error\"}".to_string())
            }
        };
        let response = tiny_http::Response::from_string(response_body).with_header(
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header is valid"),
        );
        if let Err(e) = request.respond(response) {
            log::warn!("failed to send response: {e}");
        }
    }
    Ok(())
}

fn cmd_stats(db_path: &Path, longest_wins: bool) -> Result<()> {
    let database = Database::open(db_path)?;
    for n in 0u8..=8 {
        let cache = PositionCache::build(n);
        let mut ties = 0u64;
        let mut a_wins = 0u64;
        let mut b_wins = 0u64;
        let mut longest = 0u8;
        for g in 0..cache.len() {
            let (a, b) = cache.get(g);
            let s: Score = database.score(a, b, n);
            match s {
                SCORE_TIE => ties += 1,
                s if s > SCORE_TIE && s <= SCORE_A_WIN => {
                    a_wins += 1;
                    if longest_wins {
                        longest = longest.max((SCORE_A_WIN - s) as u8);
                    }
                }
                s if s < SCORE_TIE && s >= SCORE_B_WIN => {
                    b_wins += 1;
                    if longest_wins {
                        longest = longest.max((s - SCORE_B_WIN) as u8);
                    }
                }
                _ => {}
            }
        }
        if longest_wins {
            println!("layer {n}: {ties} draws, {a_wins} A wins, {b_wins} B wins, longest forced win {longest} plies");
        } else {
            println!("layer {n}: {ties} draws, {a_wins} A wins, {b_wins} B wins");
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct QueryRequest {
    a: Vec<u32>,
    b: Vec<u32>,
    #[serde(default)]
    turn: Option<String>,
}

#[derive(Serialize)]
struct MoveJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<u32>,
    to: u32,
    score: i32,
    outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance: Option<u8>,
}

#[derive(Serialize)]
struct QueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    a: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    b: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    turn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pieces: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    moves: Option<Vec<MoveJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl QueryResponse {
    fn error(message: String) -> Self {
        Self {
            a: None,
            b: None,
            turn: None,
            phase: None,
            pieces: None,
            score: None,
            outcome: None,
            distance: None,
            moves: None,
            error: Some(message),
        }
    }
}

fn outcome_str(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::AWin => "a",
        Outcome::BWin => "b",
        Outcome::Draw => "draw",
        Outcome::Illegal => "illegal",
    }
}

fn handle_query(database: &Database, request: &mut tiny_http::Request) -> Result<String> {
    if request.method() != &tiny_http::Method::Post {
        return Ok(serde_json::to_string(&QueryResponse::error("POST required".to_string()))?);
    }

    let mut body = String::new();
    request
        .as_reader()
        .read_to_string(&mut body)
        .context("reading request body")?;

    let parsed: QueryRequest = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(_) => return Ok(serde_json::to_string(&QueryResponse::error("invalid JSON".to_string()))?),
    };

    let mut a_mask = 0u32;
    for &sq in &parsed.a {
        if sq > 24 {
            return Ok(serde_json::to_string(&QueryResponse::error(format!("invalid square: {sq}")))?);
        }
        a_mask |= 1 << sq;
    }
    let mut b_mask = 0u32;
    for &sq in &parsed.b {
        if sq > 24 {
            return Ok(serde_json::to_string(&QueryResponse::error(format!("invalid square: {sq}")))?);
        }
        b_mask |= 1 << sq;
    }

    let turn_hint = match parsed.turn.as_deref() {
        Some("b") => Turn::B,
        _ => Turn::A,
    };

    let result = match lookup(database, a_mask, b_mask, turn_hint) {
        Ok(r) => r,
        Err(e) => return Ok(serde_json::to_string(&QueryResponse::error(lookup_error_message(e)))?),
    };

    Ok(serde_json::to_string(&to_response(a_mask, b_mask, &result))?)
}

fn lookup_error_message(err: LookupError) -> String {
    err.to_string()
}

fn to_response(a: u32, b: u32, result: &Lookup) -> QueryResponse {
    let moves = result
        .moves
        .iter()
        .map(|m| MoveJson {
            from: m.from,
            to: m.to,
            score: m.score as i32,
            outcome: outcome_str(m.outcome).to_string(),
            distance: m.distance,
        })
        .collect();

    QueryResponse {
        a: Some(mask_to_squares(a)),
        b: Some(mask_to_squares(b)),
        turn: Some(match result.turn {
            Turn::A => "a".to_string(),
            Turn::B => "b".to_string(),
        }),
        phase: Some(match result.phase {
            Phase::Drop => "drop".to_string(),
            Phase::Play => "play".to_string(),
        }),
        pieces: Some(result.pieces),
        score: Some(result.score as i32),
        outcome: Some(outcome_str(result.outcome).to_string()),
        distance: result.distance,
        moves: Some(moves),
        error: None,
    }
}

fn mask_to_squares(mask: u32) -> Vec<u32> {
    (0..25).filter(|sq| mask & (1 << sq) != 0).collect()
}
