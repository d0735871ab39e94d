//! Cover Engine - command line driver
//!
//! Loads a scene, declares attacks between the requested entities, records
//! the resolved cover, reconciles, and prints every target's aggregates.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use cover_engine::core::config::CoverConfig;
use cover_engine::core::error::{CoverError, Result};
use cover_engine::core::types::{ActorType, EntityId};
use cover_engine::cover::{CoverAggregate, CoverService};
use cover_engine::scene::{load_scene, Entity, SceneProvider, VisibilityTable};

#[derive(Parser, Debug)]
#[command(name = "cover-engine")]
#[command(about = "Resolve cover between scene entities and print the resulting aggregates")]
#[command(group(ArgGroup::new("pairs").required(true).args(["attacker", "all"])))]
struct Args {
    /// Scene file (JSON)
    #[arg(long)]
    scene: PathBuf,

    /// Cover configuration (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Attacking entity, by id or name
    #[arg(long, requires = "target")]
    attacker: Option<String>,

    /// Target entity, by id or name
    #[arg(long, requires = "attacker")]
    target: Option<String>,

    /// Declare an attack between every ordered pair of creatures
    #[arg(long)]
    all: bool,
}

#[derive(Serialize)]
struct TargetReport {
    target: EntityId,
    name: String,
    aggregates: Vec<CoverAggregate>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cover_engine=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CoverConfig::load(path)?,
        None => CoverConfig::default(),
    };
    let scene = Arc::new(load_scene(&args.scene)?);
    tracing::info!(entities = scene.len(), "scene loaded");

    let entities = scene.entities();
    let pairs = if args.all {
        creature_pairs(&entities)
    } else {
        match (&args.attacker, &args.target) {
            (Some(attacker), Some(target)) => {
                vec![(find(&entities, attacker)?, find(&entities, target)?)]
            }
            _ => Vec::new(),
        }
    };

    let service = CoverService::new(scene, Arc::new(VisibilityTable::new()), config);
    let rt = Runtime::new()?;
    let reports = rt.block_on(async {
        for (attacker, target) in &pairs {
            let context = service.on_attack_declared(attacker.id, target.id).await?;
            println!("{} -> {}: {}", attacker.name, target.name, context.severity.label());
            service.complete_attack(context.id);
        }
        service.reconcile_all().await;

        let mut reports = Vec::new();
        for entity in &entities {
            let aggregates = service.aggregates(entity.id).await;
            if !aggregates.is_empty() {
                reports.push(TargetReport {
                    target: entity.id,
                    name: entity.name.clone(),
                    aggregates,
                });
            }
        }
        Ok::<_, CoverError>(reports)
    })?;

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

/// Every ordered pair of distinct creatures
fn creature_pairs(entities: &[Entity]) -> Vec<(Entity, Entity)> {
    let creatures: Vec<&Entity> = entities
        .iter()
        .filter(|e| e.actor_type == ActorType::Creature)
        .collect();
    let mut pairs = Vec::new();
    for attacker in &creatures {
        for target in &creatures {
            if attacker.id != target.id {
                pairs.push(((*attacker).clone(), (*target).clone()));
            }
        }
    }
    pairs
}

/// Look an entity up by id, then by case-insensitive name
fn find(entities: &[Entity], key: &str) -> Result<Entity> {
    entities
        .iter()
        .find(|e| e.id.to_string() == key || e.name.eq_ignore_ascii_case(key))
        .cloned()
        .ok_or_else(|| CoverError::UnknownEntity(key.to_string()))
}
