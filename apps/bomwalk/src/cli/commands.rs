//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands. Every
//! command opens the redb catalog named by the settings, acts on the
//! configured workspace and prints either text or JSON.

use super::{BaselineCommand, EffectivityCommand, Policy, ResolveArgs, RevisionArgs};
use crate::config::Settings;
use bomwalk_core::{
    BaselineCapture, BaselineFilter, BaselineRequest, BaselineStore, BomError, CatalogSnapshot,
    CollectingObserver, ComponentSummary, ConfigurationFilter, ConfigurationItemKey,
    ConfigurationResolver, Effectivity, EffectivityContext, EffectivityFilter, EffectivityManager,
    EffectivityRange, LatestFilter, PartMasterKey, PartRepository, PartRevisionKey, PartStore,
    ProductBaseline, RedbCatalog, ReleasedFilter, decode_path,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for snapshot import (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), BomError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| BomError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(BomError::Deserialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path and make sure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, BomError> {
    let canonical = path.canonicalize().map_err(|e| {
        BomError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(BomError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve the parent directory of an output path.
fn validate_output_path(path: &Path) -> Result<PathBuf, BomError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        BomError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(BomError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| BomError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty catalog database.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), BomError> {
    let path = &settings.database;
    if path.exists() {
        if !force {
            return Err(BomError::NotAllowed(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| BomError::Io(format!("Remove {}: {}", path.display(), e)))?;
    }

    RedbCatalog::open(path)?;
    tracing::info!(database = %path.display(), "catalog initialized");
    println!("Initialized new catalog at {:?}", path);
    Ok(())
}

// =============================================================================
// IMPORT / EXPORT COMMANDS
// =============================================================================

/// Load a JSON snapshot into the catalog, creating the database if needed.
pub fn cmd_import(settings: &Settings, input: &Path) -> Result<(), BomError> {
    let validated = validate_file_path(input)?;
    validate_file_size(&validated, MAX_IMPORT_FILE_SIZE)?;

    let text = std::fs::read_to_string(&validated)
        .map_err(|e| BomError::Io(format!("Read file: {}", e)))?;
    let snapshot = CatalogSnapshot::from_json(&text)?;
    let workspace = snapshot.workspace.clone();

    let mut catalog = RedbCatalog::open(&settings.database)?;
    let summary = snapshot.apply(&mut catalog)?;

    if settings.json_mode {
        let output = serde_json::json!({
            "workspace": workspace,
            "imported": summary,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "Imported into workspace {}: {} parts, {} configuration items, {} baselines ({} already present)",
        workspace,
        summary.part_masters,
        summary.configuration_items,
        summary.baselines,
        summary.skipped_baselines
    );
    Ok(())
}

/// Write the configured workspace as a JSON snapshot.
pub fn cmd_export(settings: &Settings, output: &Path) -> Result<(), BomError> {
    let validated = validate_output_path(output)?;
    let catalog = open_existing(settings)?;

    let snapshot = CatalogSnapshot::collect(&catalog, &settings.workspace)?;
    let json = snapshot.to_json()?;
    std::fs::write(&validated, json.as_bytes())
        .map_err(|e| BomError::Io(format!("Write file: {}", e)))?;

    println!(
        "Exported {} parts and {} configuration items ({} bytes) to {:?}",
        snapshot.part_masters.len(),
        snapshot.configuration_items.len(),
        json.len(),
        validated
    );
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Counts of one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStatus {
    pub workspace: String,
    pub part_masters: usize,
    pub revisions: usize,
    pub released_revisions: usize,
    pub configuration_items: usize,
    pub baselines: usize,
}

pub fn catalog_status(settings: &Settings) -> Result<CatalogStatus, BomError> {
    let catalog = open_existing(settings)?;
    let parts = catalog.part_masters(&settings.workspace)?;
    let items = catalog.configuration_items(&settings.workspace)?;

    let mut baselines = 0;
    for item in &items {
        baselines += catalog.baselines(&item.key)?.len();
    }

    Ok(CatalogStatus {
        workspace: settings.workspace.clone(),
        part_masters: parts.len(),
        revisions: parts.iter().map(|p| p.revisions.len()).sum(),
        released_revisions: parts
            .iter()
            .flat_map(|p| p.revisions.iter())
            .filter(|r| r.is_released())
            .count(),
        configuration_items: items.len(),
        baselines,
    })
}

/// Show catalog status.
pub fn cmd_status(settings: &Settings) -> Result<(), BomError> {
    let status = catalog_status(settings)?;

    if settings.json_mode {
        let output = serde_json::json!({
            "database": settings.database.to_string_lossy(),
            "status": status,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("bomwalk Catalog Status");
    println!("======================");
    println!("Database:  {:?}", settings.database);
    println!("Workspace: {}", status.workspace);
    println!();
    println!("Parts:               {}", status.part_masters);
    println!(
        "Revisions:           {} ({} released)",
        status.revisions, status.released_revisions
    );
    println!("Configuration items: {}", status.configuration_items);
    println!("Baselines:           {}", status.baselines);
    Ok(())
}

// =============================================================================
// RESOLVE COMMAND
// =============================================================================

/// Result of a `resolve`: the tree and every diagnostic met on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub policy: String,
    pub tree: ComponentSummary,
    pub diagnostics: Vec<String>,
}

/// Run the resolver as described by `args`.
pub fn resolve_tree(settings: &Settings, args: &ResolveArgs) -> Result<Resolution, BomError> {
    let catalog = open_existing(settings)?;
    let workspace = settings.workspace.as_str();

    let item = match &args.ci {
        Some(id) => Some(catalog.load_configuration_item(&ConfigurationItemKey::new(workspace, id))?),
        None => None,
    };
    let root_key = match (&args.part, &item) {
        (Some(number), _) => PartMasterKey::new(workspace, number),
        (None, Some(item)) => item.root_key(),
        (None, None) => {
            return Err(BomError::NotAllowed(
                "resolve needs --part or --ci".to_string(),
            ));
        }
    };

    let filter: Box<dyn ConfigurationFilter> = match args.policy {
        Policy::Latest => Box::new(LatestFilter::new(args.diverge)),
        Policy::Released => Box::new(ReleasedFilter::new(args.diverge)),
        Policy::Effective => {
            let mut context = EffectivityContext {
                serial_number: args.serial.clone(),
                date: args.date.as_deref().map(parse_date).transpose()?,
                lot_id: args.lot.clone(),
                configuration_item: item.as_ref().map(|i| i.key.clone()),
            };
            if context.serial_number.is_none() && context.date.is_none() && context.lot_id.is_none()
            {
                context.date = Some(Utc::now());
            }
            Box::new(EffectivityFilter::new(context))
        }
        Policy::Baseline => {
            let (Some(item), Some(name)) = (&item, &args.baseline) else {
                return Err(BomError::NotAllowed(
                    "--policy baseline needs --ci and --baseline".to_string(),
                ));
            };
            let baseline = catalog.load_baseline(&item.key, name)?;
            Box::new(BaselineFilter::new(&baseline))
        }
    };

    let max_depth = args.depth.or(settings.max_depth);
    let resolver = ConfigurationResolver::new(&catalog, filter);
    let mut observer = CollectingObserver::new();

    let tree = match &args.path {
        Some(path) => {
            let links = decode_path(&catalog, &root_key, path)?;
            resolver.resolve_from_path(workspace, links, max_depth, &mut observer)?
        }
        None => {
            let root = catalog.load_part_master(&root_key)?;
            resolver.resolve_from_root(root, max_depth, &mut observer)?
        }
    };

    tracing::info!(
        root = %root_key,
        policy = ?args.policy,
        components = tree.component_count(),
        diagnostics = observer.diagnostics().count(),
        "product resolved"
    );

    Ok(Resolution {
        policy: format!("{:?}", args.policy).to_lowercase(),
        tree: tree.summary(),
        diagnostics: observer.diagnostics().map(ToString::to_string).collect(),
    })
}

/// Resolve and print a product structure.
pub fn cmd_resolve(settings: &Settings, args: &ResolveArgs) -> Result<(), BomError> {
    let resolution = resolve_tree(settings, args)?;

    if settings.json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&resolution).unwrap_or_default()
        );
        return Ok(());
    }

    print!("{}", render_tree(&resolution.tree));
    if !resolution.diagnostics.is_empty() {
        println!();
        println!("Diagnostics:");
        for diagnostic in &resolution.diagnostics {
            println!("  {}", diagnostic);
        }
    }
    Ok(())
}

/// Indented text rendering, one component per line.
///
/// ```text
/// BIKE  [BIKE-A-1]  -1
///   FRAME  [FRAME-A-2]  x1  -1-u1
///   WHEEL  [WHEEL-B-1]  x2 pcs  -1-u2
/// ```
pub fn render_tree(tree: &ComponentSummary) -> String {
    let mut out = String::new();
    render_node(tree, 0, &mut out);
    out
}

fn render_node(node: &ComponentSummary, level: usize, out: &mut String) {
    out.push_str(&"  ".repeat(level));
    out.push_str(&node.number);
    match &node.iteration {
        Some(iteration) => out.push_str(&format!("  [{}]", iteration)),
        None => out.push_str("  [unresolved]"),
    }
    if level > 0 {
        out.push_str(&format!("  x{}", node.amount));
        if let Some(unit) = &node.unit {
            out.push_str(&format!(" {}", unit));
        }
    }
    if node.optional {
        out.push_str("  (optional)");
    }
    out.push_str(&format!("  {}\n", node.path));

    for child in &node.children {
        render_node(child, level + 1, out);
    }
}

// =============================================================================
// BASELINE COMMANDS
// =============================================================================

pub fn cmd_baseline(settings: &Settings, action: BaselineCommand) -> Result<(), BomError> {
    match action {
        BaselineCommand::Create {
            ci,
            name,
            kind,
            description,
            substitutes,
            optionals,
        } => {
            let mut request = BaselineRequest::new(name, kind.parse()?);
            request.description = description;
            request.substitute_links = substitutes;
            request.optional_usage_links = optionals;

            let baseline = create_baseline(settings, &ci, request)?;
            if settings.json_mode {
                print_json(&baseline);
            } else {
                println!(
                    "Captured baseline {} of {}: {} paths, {} parts",
                    baseline.name,
                    baseline.configuration_item,
                    baseline.paths.len(),
                    baseline.baselined_parts.len()
                );
            }
            Ok(())
        }
        BaselineCommand::List { ci } => {
            let catalog = open_existing(settings)?;
            let baselines = catalog.baselines(&ConfigurationItemKey::new(&settings.workspace, ci))?;

            if settings.json_mode {
                let rows: Vec<_> = baselines
                    .iter()
                    .map(|b| {
                        serde_json::json!({
                            "name": b.name,
                            "kind": b.kind,
                            "created": b.created,
                            "parts": b.baselined_parts.len(),
                        })
                    })
                    .collect();
                print_json(&rows);
                return Ok(());
            }

            if baselines.is_empty() {
                println!("No baselines");
            }
            for b in &baselines {
                println!(
                    "{}  {}  {}  {} parts",
                    b.name,
                    b.kind,
                    b.created.format("%Y-%m-%d %H:%M:%S"),
                    b.baselined_parts.len()
                );
            }
            Ok(())
        }
        BaselineCommand::Show { ci, name } => {
            let catalog = open_existing(settings)?;
            let baseline =
                catalog.load_baseline(&ConfigurationItemKey::new(&settings.workspace, ci), &name)?;

            if settings.json_mode {
                print_json(&baseline);
                return Ok(());
            }

            println!("Baseline {} ({})", baseline.name, baseline.kind);
            println!("Configuration item: {}", baseline.configuration_item);
            println!("Created:            {}", baseline.created.to_rfc3339());
            if !baseline.description.is_empty() {
                println!("Description:        {}", baseline.description);
            }
            println!();
            println!("Parts:");
            for (number, part) in &baseline.baselined_parts {
                println!("  {}  {}-{}", number, part.version, part.iteration);
            }
            println!("Paths:");
            for path in &baseline.paths {
                println!("  {}", path);
            }
            Ok(())
        }
    }
}

/// Capture a baseline of `ci` into the catalog.
pub fn create_baseline(
    settings: &Settings,
    ci: &str,
    request: BaselineRequest,
) -> Result<ProductBaseline, BomError> {
    let mut catalog = open_existing(settings)?;
    BaselineCapture::new(&mut catalog).capture(&ConfigurationItemKey::new(&settings.workspace, ci), request)
}

// =============================================================================
// EFFECTIVITY COMMANDS
// =============================================================================

pub fn cmd_effectivity(settings: &Settings, action: EffectivityCommand) -> Result<(), BomError> {
    let mut catalog = open_existing(settings)?;

    match action {
        EffectivityCommand::AddSerial {
            target,
            label,
            ci,
            start,
            end,
        } => {
            let revision = revision_key(settings, &target);
            let created = EffectivityManager::new(&mut catalog).create_serial_number_based(
                &revision,
                &label.name,
                &label.description,
                &ci,
                Some(start.as_str()),
                end.as_deref(),
            )?;
            print_effectivity(settings, &created);
        }
        EffectivityCommand::AddDate {
            target,
            label,
            ci,
            start,
            end,
        } => {
            let revision = revision_key(settings, &target);
            let start = parse_date(&start)?;
            let end = end.as_deref().map(parse_date).transpose()?;
            let created = EffectivityManager::new(&mut catalog).create_date_based(
                &revision,
                &label.name,
                &label.description,
                ci.as_deref(),
                Some(start),
                end,
            )?;
            print_effectivity(settings, &created);
        }
        EffectivityCommand::AddLot {
            target,
            label,
            ci,
            start,
            end,
        } => {
            let revision = revision_key(settings, &target);
            let created = EffectivityManager::new(&mut catalog).create_lot_based(
                &revision,
                &label.name,
                &label.description,
                &ci,
                Some(start.as_str()),
                end.as_deref(),
            )?;
            print_effectivity(settings, &created);
        }
        EffectivityCommand::List { target } => {
            let revision = revision_key(settings, &target);
            let effectivities = list_effectivities(&catalog, &revision)?;
            if settings.json_mode {
                print_json(&effectivities);
            } else if effectivities.is_empty() {
                println!("No effectivities on {}", revision);
            } else {
                for effectivity in &effectivities {
                    println!("{}", describe_effectivity(effectivity));
                }
            }
        }
        EffectivityCommand::Remove { target, id } => {
            let revision = revision_key(settings, &target);
            EffectivityManager::new(&mut catalog).delete_effectivity(&revision, id)?;
            println!("Removed effectivity {} from {}", id, revision);
        }
    }
    Ok(())
}

/// Effectivities attached to a revision, in attachment order.
pub fn list_effectivities<S: PartStore + ?Sized>(
    store: &S,
    revision: &PartRevisionKey,
) -> Result<Vec<Effectivity>, BomError> {
    let part = store.load_part_master(&revision.part)?;
    part.revision(&revision.version)
        .map(|r| r.effectivities.clone())
        .ok_or_else(|| BomError::PartRevisionNotFound(revision.clone()))
}

/// One-line description: `#3 SN-batch serial number 100..199 [ws/CI-1]`.
pub fn describe_effectivity(effectivity: &Effectivity) -> String {
    let range = match &effectivity.range {
        EffectivityRange::SerialNumber { start, end } | EffectivityRange::Lot { start, end } => {
            format!("{}..{}", start, end.as_deref().unwrap_or(""))
        }
        EffectivityRange::Date { start, end } => format!(
            "{}..{}",
            start.format("%Y-%m-%d"),
            end.as_ref()
                .map(|e| e.format("%Y-%m-%d").to_string()).unwrap_or_default()
        ),
    };
    let mut line = format!(
        "#{} {} {} {}",
        effectivity.id,
        effectivity.name,
        effectivity.range.kind(),
        range
    );
    if let Some(item) = &effectivity.configuration_item {
        line.push_str(&format!(" [{}]", item));
    }
    line
}

fn print_effectivity(settings: &Settings, effectivity: &Effectivity) {
    if settings.json_mode {
        print_json(effectivity);
    } else {
        println!("Created effectivity {}", describe_effectivity(effectivity));
    }
}

fn revision_key(settings: &Settings, target: &RevisionArgs) -> PartRevisionKey {
    PartRevisionKey::new(
        PartMasterKey::new(&settings.workspace, &target.part),
        &target.version,
    )
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the catalog, refusing to create one as a side effect of a read.
pub fn open_existing(settings: &Settings) -> Result<RedbCatalog, BomError> {
    if !settings.database.exists() {
        return Err(BomError::Io(format!(
            "No catalog at {:?}. Run `bomwalk init` or `bomwalk import` first.",
            settings.database
        )));
    }
    RedbCatalog::open(&settings.database)
}

/// Accept `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, BomError> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| {
            BomError::NotAllowed(format!(
                "invalid date: {}. Use YYYY-MM-DD or RFC 3339",
                value
            ))
        })
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// TESTS
// =============================================================================
