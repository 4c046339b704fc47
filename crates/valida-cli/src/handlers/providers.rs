//! Provider inspection command handlers

use crate::cli::{ProvidersAction, ProvidersArgs, SelectArgs};
use crate::config::Config;
use crate::error::Result;
use crate::output::OutputWriter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use valida_core::context::{self, FixedContextAccessor};
use valida_core::provider_discovery::CacheEntryInfo;
use valida_core::{
    by_default_provider, select_by_name, CacheStats, Configuration, DiscoveryResolver,
    IsolationContext, ManifestRegistry,
};

/// Handle the providers command
pub fn handle_providers(
    args: ProvidersArgs,
    config: &Config,
    output: &mut OutputWriter,
) -> Result<()> {
    let resolver = Arc::new(build_resolver(config, args.manifest_dir.as_deref()));

    match args.action {
        ProvidersAction::List => handle_list(&resolver, output),
        ProvidersAction::Select(select_args) => handle_select(select_args, resolver, output),
        ProvidersAction::Cache => handle_cache(&resolver, output),
    }
}

/// Resolver whose thread context is the manifest directory, if any
fn build_resolver(config: &Config, manifest_dir: Option<&Path>) -> DiscoveryResolver {
    let manifest_dir = manifest_dir
        .map(Path::to_path_buf)
        .or_else(|| config.paths.manifest_dir.clone());

    let thread = manifest_dir.map(|dir| {
        tracing::debug!(dir = %dir.display(), "Using manifest directory as thread context");
        IsolationContext::new(
            format!("manifests:{}", dir.display()),
            Arc::new(ManifestRegistry::new(dir)),
        )
    });

    DiscoveryResolver::with_accessor(
        config.resolver.clone(),
        Arc::new(FixedContextAccessor::new(thread, context::module_context())),
    )
}

#[derive(Debug, Serialize)]
struct ProviderRow {
    position: usize,
    name: String,
    type_name: String,
    default: bool,
}

fn handle_list(resolver: &DiscoveryResolver, output: &mut OutputWriter) -> Result<()> {
    let rows: Vec<ProviderRow> = resolver
        .resolve_providers()?
        .iter()
        .enumerate()
        .map(|(position, provider)| ProviderRow {
            position,
            name: provider.name().to_string(),
            type_name: provider.type_name().to_string(),
            default: position == 0,
        })
        .collect();

    if !output.is_human() {
        return output.data(&rows);
    }

    if rows.is_empty() {
        return output.warning("No validation providers found");
    }

    output.section("Validation providers")?;
    let table = rows
        .iter()
        .map(|row| {
            vec![
                row.position.to_string(),
                row.name.clone(),
                row.type_name.clone(),
                if row.default { "yes" } else { "" }.to_string(),
            ]
        })
        .collect();
    output.table(&["#", "NAME", "TYPE", "DEFAULT"], table)
}

#[derive(Debug, Serialize)]
struct Selection {
    name: String,
    type_name: String,
    properties: BTreeMap<String, String>,
}

fn handle_select(
    args: SelectArgs,
    resolver: Arc<DiscoveryResolver>,
    output: &mut OutputWriter,
) -> Result<()> {
    let mut configuration = match &args.name {
        Some(name) => {
            let providers = resolver.resolve_providers()?;
            Configuration::new(select_by_name(&providers, name)?)
        }
        None => by_default_provider().provider_resolver(resolver).configure()?,
    };

    for (key, value) in args.properties {
        configuration = configuration.add_property(key, value);
    }

    let factory = configuration.build_validator_factory()?;
    let selection = Selection {
        name: configuration.provider().name().to_string(),
        type_name: configuration.provider().type_name().to_string(),
        properties: factory.properties().clone(),
    };
    factory.close();

    if !output.is_human() {
        return output.data(&selection);
    }

    output.success(&format!(
        "Selected provider '{}' ({})",
        selection.name, selection.type_name
    ))?;
    for (key, value) in &selection.properties {
        output.info(&format!("{} = {}", key, value))?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CacheReport {
    providers: Vec<String>,
    scans: u64,
    utilization: f64,
    stats: CacheStats,
    entries: Vec<CacheEntryInfo>,
}

fn handle_cache(resolver: &DiscoveryResolver, output: &mut OutputWriter) -> Result<()> {
    let providers = resolver
        .resolve_providers()?
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    let stats = resolver.cache_stats();
    let report = CacheReport {
        providers,
        scans: resolver.scan_count(),
        utilization: stats.utilization(),
        stats,
        entries: resolver.cache_snapshot(),
    };

    if !output.is_human() {
        return output.data(&report);
    }

    output.section("Discovery cache")?;
    output.info(&format!(
        "{} entr{} ({} live), {} scan(s), {:.1}% of {} slots used",
        report.stats.total_entries,
        if report.stats.total_entries == 1 { "y" } else { "ies" },
        report.stats.live_keys,
        report.scans,
        report.utilization,
        report.stats.max_entries,
    ))?;

    let rows = report
        .entries
        .iter()
        .map(|entry| {
            vec![
                entry.context_id.to_string(),
                entry.context_name.clone(),
                match &entry.providers {
                    Some(names) if names.is_empty() => "(none)".to_string(),
                    Some(names) => names.join(", "),
                    None => "(reclaimed)".to_string(),
                },
                entry.cached_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    output.table(&["ID", "CONTEXT", "PROVIDERS", "CACHED AT"], rows)
}
