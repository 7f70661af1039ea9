//! Run with: cargo run --package server --bin generate-types --features typescript

use std::fs;
use std::path::Path;

fn main() {
    println!("Generating TypeScript types...");

    let out_dir = Path::new("frontend/src/types/generated");

    if let Err(e) = fs::create_dir_all(out_dir) {
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    #[cfg(feature = "typescript")]
    {
        if let Err(e) = export_all(out_dir) {
            eprintln!("Failed to export types: {}", e);
            std::process::exit(1);
        }
        println!("Types exported to {}", out_dir.display());

        if let Err(e) = generate_index(out_dir) {
            eprintln!("Failed to write index.ts: {}", e);
            std::process::exit(1);
        }
    }

    #[cfg(not(feature = "typescript"))]
    {
        eprintln!("Error: typescript feature is not enabled");
        eprintln!("Run with: cargo run --package server --bin generate-types --features typescript");
        std::process::exit(1);
    }
}

/// `export_all_to` also writes every type a root depends on, so the
/// session, utterance and event roots cover the whole domain.
#[cfg(feature = "typescript")]
fn export_all(out_dir: &Path) -> Result<(), ts_rs::ExportError> {
    use ts_rs::TS;

    debate_core::Session::export_all_to(out_dir)?;
    debate_core::SessionConfig::export_all_to(out_dir)?;
    debate_core::Utterance::export_all_to(out_dir)?;
    debate_core::PendingIntervention::export_all_to(out_dir)?;
    debate_core::HumanInputRequest::export_all_to(out_dir)?;

    events::EventEnvelope::export_all_to(out_dir)?;
    events::Event::export_all_to(out_dir)?;

    orchestrator::Intervention::export_all_to(out_dir)?;
    orchestrator::SubscriberInfo::export_all_to(out_dir)?;
    Ok(())
}

#[cfg(feature = "typescript")]
const INDEX_MODULES: &[&str] = &[
    "Session",
    "SessionStatus",
    "SessionConfig",
    "SessionOption",
    "DebateSettings",
    "HumanSeat",
    "QualityPolicy",
    "TimeoutFallback",
    "InterruptionPolicy",
    "Brevity",
    "DebatePhase",
    "PhaseCursor",
    "Side",
    "TurnKind",
    "EvidenceFocus",
    "Utterance",
    "UtteranceMetadata",
    "QualityWarning",
    "Severity",
    "EvidenceClass",
    "PendingIntervention",
    "InterventionKind",
    "HumanInputRequest",
    "EventEnvelope",
    "Event",
    "Intervention",
    "SubscriberInfo",
];

#[cfg(feature = "typescript")]
fn generate_index(out_dir: &Path) -> std::io::Result<()> {
    let index_path = out_dir.join("index.ts");

    let mut contents = String::from(
        "// Auto-generated - regenerate with: cargo run --package server --bin generate-types --features typescript\n\n",
    );
    for module in INDEX_MODULES {
        contents.push_str(&format!("export * from './{}';\n", module));
    }

    fs::write(&index_path, contents)?;
    println!("Generated {}", index_path.display());
    Ok(())
}
