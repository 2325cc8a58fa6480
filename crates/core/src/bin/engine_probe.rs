//! Quick end-to-end probe against a real engine
//!
//! Discovers a UCI engine (or takes a path as the first argument), analyzes
//! the starting position for the default move time, and prints the engine's
//! thinking followed by the sealed result.

use std::path::PathBuf;

use gm_guide_core::{
    AnalysisRequest, EngineEvent, Position, SessionConfig,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let explicit_path = std::env::args().nth(1).map(PathBuf::from);

    let session = match gm_guide_core::discover_and_start(
        SessionConfig::default(),
        explicit_path.as_deref(),
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Engine unavailable: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Engine: {} by {}",
        session.engine_name().unwrap_or("unknown"),
        session.engine_author().unwrap_or("unknown")
    );
    println!("Declared options: {}", session.declared_options().len());

    let request = AnalysisRequest::new(Position::startpos());
    let mut handle = match session.analyze(request).await {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Analysis failed to start: {}", e);
            std::process::exit(1);
        }
    };

    while let Some(event) = handle.next_event().await {
        if let EngineEvent::Info(info) = event {
            if let (Some(depth), Some(score)) = (info.depth, info.score) {
                println!("  depth {:>2}  {}  pv {}", depth, score, info.pv.join(" "));
            }
        }
    }

    match handle.wait().await {
        Ok(result) => {
            println!();
            println!(
                "Best move: {}",
                result.best_move.as_deref().unwrap_or("(none)")
            );
            if let Some(ponder) = &result.ponder {
                println!("Ponder:    {}", ponder);
            }
            if let Some(score) = result.score {
                println!("Score:     {}", score);
            }
        }
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = session.shutdown().await {
        eprintln!("Shutdown failed: {}", e);
    }
}
