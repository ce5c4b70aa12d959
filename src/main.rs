// Entry point and interactive CLI flow.
//
// - Option [1] loads and normalizes the inspection spreadsheet and, when a
//   data service is configured, imports it in bulk.
// - Options [2]-[4] show the dashboard, set its filters, and browse the table.
// - Option [5] exports the paginated report.
// - Options [6]-[10] talk to the data service: sync, add, edit, delete one,
//   delete all. Changes made elsewhere are picked up by a background poller.
use chrono::{Datelike, Local};
use clap::Parser;
use inspection_dashboard::config::{Overrides, Settings};
use inspection_dashboard::fields::{field_label, FORM_SECTIONS};
use inspection_dashboard::filters::{FilterOptions, FilterSpec};
use inspection_dashboard::form::InspectionDraft;
use inspection_dashboard::service::HttpDataService;
use inspection_dashboard::store::{ChangeWatcher, ImportOutcome, InspectionStore};
use inspection_dashboard::table::{ExportDocument, TableView};
use inspection_dashboard::types::InspectionRecord;
use inspection_dashboard::{loader, output, reports, util};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "inspection-dashboard")]
#[command(about = "Quality inspection dashboard and report exporter")]
#[command(version)]
struct Args {
    /// Base URL of the inspection data service
    #[arg(long, env = "INSPECTION_API_URL")]
    api_url: Option<String>,

    /// Spreadsheet (.xlsx or .csv) to import
    #[arg(short, long, env = "INSPECTION_INPUT")]
    input: Option<PathBuf>,

    /// Directory for generated files
    #[arg(short, long, env = "INSPECTION_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// TOML settings file
    #[arg(short, long, env = "INSPECTION_CONFIG")]
    config: Option<PathBuf>,
}

// Session state shared by the menu handlers.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    settings: Settings,
    filters: FilterSpec,
    /// Records loaded from a spreadsheet when no data service is configured.
    local: Vec<InspectionRecord>,
    store: Option<InspectionStore<HttpDataService>>,
    watcher: Option<ChangeWatcher>,
}

impl AppState {
    fn records(&self) -> &[InspectionRecord] {
        match &self.store {
            Some(store) => store.records(),
            None => &self.local,
        }
    }
}

fn lock_state() -> std::sync::MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn prompt(label: &str) -> String {
    print!("{}: ", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    prompt("Enter choice")
}

/// Ask whether to go back to the menu. Returns `true` for `Y`.
fn prompt_back_to_menu() -> bool {
    loop {
        match prompt("Back to Menu (Y/N)").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Option [1]
fn handle_load() {
    let mut guard = lock_state();
    let state = &mut *guard;
    let path = state.settings.input.clone();
    let (records, report) = match loader::load_and_clean(&path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
            return;
        }
    };

    println!(
        "Processing spreadsheet... ({} rows read, {} imported, {} blank)",
        util::format_int(report.total_rows as i64),
        util::format_int(report.imported_rows as i64),
        util::format_int(report.blank_rows as i64)
    );
    if report.unparsable_dates > 0 {
        println!(
            "Note: {} dates could not be parsed and were kept as written.",
            util::format_int(report.unparsable_dates as i64)
        );
    }
    if report.zero_filled_numbers > 0 {
        println!(
            "Note: {} non-numeric cells were read as 0.",
            util::format_int(report.zero_filled_numbers as i64)
        );
    }
    if report.header_collisions > 0 {
        println!(
            "Warning: {} columns shared a field name; the later column was kept.",
            util::format_int(report.header_collisions as i64)
        );
    }

    match state.store.as_mut() {
        Some(store) => match store.import(records) {
            ImportOutcome::Persisted { count } => {
                println!("{} inspections imported and saved.\n", util::format_int(count as i64));
            }
            ImportOutcome::LocalOnly { count, error } => {
                println!(
                    "{} inspections saved locally, NOT persisted: {}\n",
                    util::format_int(count as i64),
                    error
                );
            }
        },
        None => {
            state.local = records;
            println!("Working offline on the loaded spreadsheet.\n");
        }
    }
}

/// Option [2]
fn handle_dashboard() {
    let state = lock_state();
    if state.records().is_empty() {
        println!("Error: No data loaded. Load the spreadsheet (option 1) or sync (option 6) first.\n");
        return;
    }
    let rows = state.settings.preview_rows;
    let vm = reports::aggregate(state.records(), &state.filters);

    let k = &vm.kpi;
    println!("\nInspections: {}", util::format_int(k.total as i64));
    println!(
        "Pass: {}  Fail: {}  Abort: {}  Pending: {}",
        util::format_count(k.total_pass),
        util::format_count(k.total_fail),
        util::format_count(k.total_abort),
        util::format_count(k.total_pending)
    );
    println!(
        "Pass rate: {}%  Fail rate: {}%  Total defects: {}  Actual OQL: {}",
        util::format_number(k.pass_rate, 2),
        util::format_number(k.fail_rate, 2),
        util::format_count(k.total_defects),
        util::format_number(k.actual_oql, 2)
    );

    output::preview_table("Monthly Inspection Status", None, &vm.monthly_status, rows);
    output::preview_table("Inspector Performance", None, &vm.inspectors, rows);
    output::preview_table("Critical Defects Trend", None, &vm.critical_trend, rows);
    output::preview_table("Major vs Minor Defects", None, &vm.defect_ratio, rows);
    output::preview_table("Abort / Pending Trend", None, &vm.status_trend, rows);
    output::preview_table("OQL Trend", Some("Stored = mean of recorded OQL, Weighted = from defects"), &vm.oql_trend, rows);
    output::preview_table("DPI Trend", None, &vm.dpi_trend, rows);
    output::preview_table("Defects Distribution", None, &vm.defects_distribution, rows);

    println!("Defect Categories");
    for entry in &vm.category_radar {
        let details: Vec<String> = entry
            .details
            .iter()
            .map(|d| format!("{} {}", d.name, util::format_count(d.count)))
            .collect();
        println!("  {}: {} ({})", entry.category, util::format_count(entry.count), details.join(", "));
    }

    let path = state.settings.output_path("dashboard.json");
    match output::write_json(&path, &vm) {
        Ok(()) => println!("\n(Full dashboard exported to {})\n", path.display()),
        Err(e) => eprintln!("Write error: {}", e),
    }
}

fn pick(label: &str, options: &[String], current: &str) -> String {
    println!("{} [{}]: {}", label, current, options.join(" | "));
    let answer = prompt(label);
    if answer.is_empty() {
        return current.to_string();
    }
    if options.contains(&answer) {
        answer
    } else {
        println!("'{}' is not an option, keeping {}.", answer, current);
        current.to_string()
    }
}

/// Option [3]
fn handle_filters() {
    let mut state = lock_state();
    let options = FilterOptions::from_records(state.records());
    let current = state.filters.clone();
    let filters = FilterSpec {
        year: pick("Year", &options.years, &current.year),
        month: pick("Month", &options.months, &current.month),
        inspector: pick("Inspector", &options.inspectors, &current.inspector),
        inspection_type: pick("Inspection Type", &options.inspection_types, &current.inspection_type),
        customer: pick("Customer", &options.customers, &current.customer),
        status: pick("Status", &options.statuses, &current.status),
    };
    info!(?filters, "filters changed");
    state.filters = filters;
    println!();
}

/// Option [4]
fn handle_table() {
    let state = lock_state();
    let per_page = state.settings.rows_per_page;
    let view = TableView::build(state.records()).search(&prompt("Search (blank for all)"));
    let pages = view.total_pages(per_page);
    let mut page = 1;
    loop {
        let rows: Vec<Vec<String>> = view
            .page(page, per_page)
            .iter()
            .map(|r| {
                let mut cells = r.cells.clone();
                cells.push(util::format_count(r.total_defects));
                cells
            })
            .collect();
        let mut columns = view.columns.clone();
        columns.push(inspection_dashboard::table::TOTAL_DEFECTS_COLUMN.to_string());
        println!("\n{}", output::markdown_grid(&columns, &rows));
        println!("Page {} of {} ({} rows)", page, pages, view.rows.len());
        match prompt("[n]ext, [p]revious, other to return").as_str() {
            "n" if page < pages => page += 1,
            "p" if page > 1 => page -= 1,
            "n" | "p" => {}
            _ => break,
        }
    }
    println!();
}

/// Option [5]
fn handle_export() {
    let state = lock_state();
    let generated_at = Local::now().format("%Y-%m-%d %H:%M").to_string();
    let doc = match ExportDocument::build(state.records(), &generated_at, state.settings.export_rows_per_page) {
        Ok(doc) => doc,
        Err(e) => {
            println!("{}\n", e);
            return;
        }
    };
    match output::write_export(&doc, &state.settings.output_dir, "inspection_report") {
        Ok((text, csv)) => println!(
            "Report exported ({} pages) to {} and {}\n",
            doc.pages.len(),
            text.display(),
            csv.display()
        ),
        Err(e) => eprintln!("Export failed: {}\n", e),
    }
}

/// Option [6]
fn handle_sync() {
    let mut state = lock_state();
    let Some(store) = state.store.as_mut() else {
        println!("No data service configured (set --api-url or INSPECTION_API_URL).\n");
        return;
    };
    match store.refresh() {
        Ok(()) => println!("Synced {} inspections.\n", util::format_int(store.records().len() as i64)),
        Err(e) => println!("Failed to load inspection data: {} (showing previous data)\n", e),
    }
}

/// Prompt for every form field; a blank answer keeps the shown value.
fn fill_draft(draft: &mut InspectionDraft) {
    for (section, fields) in FORM_SECTIONS {
        println!("\n{}", section);
        for field in *fields {
            let current = draft.get(field).to_string();
            let label = if current.is_empty() {
                field_label(field)
            } else {
                format!("{} [{}]", field_label(field), current)
            };
            let answer = prompt(&label);
            if answer.is_empty() {
                continue;
            }
            if let Err(e) = draft.set(field, &answer) {
                println!("{}", e);
            }
        }
    }
}

/// Option [7]
fn handle_add() {
    let mut state = lock_state();
    let Some(store) = state.store.as_mut() else {
        println!("No data service configured (set --api-url or INSPECTION_API_URL).\n");
        return;
    };
    let mut draft = InspectionDraft::new(Local::now().year());
    fill_draft(&mut draft);
    let record = match draft.submit() {
        Ok(record) => record,
        Err(e) => {
            println!("{}\n", e);
            return;
        }
    };
    match store.add(&record) {
        Ok(()) => println!("Inspection added successfully!\n"),
        Err(e) => println!("Failed to add inspection: {}\n", e),
    }
}

/// Ask for a record and return its server id together with a copy of it.
fn pick_saved_record(store: &InspectionStore<HttpDataService>) -> Option<(String, InspectionRecord)> {
    let key = prompt("Record id or Inspection ID");
    let Some(record) = store.find(&key) else {
        println!("No inspection matches '{}'.\n", key);
        return None;
    };
    match record.id.clone() {
        Some(id) => Some((id, record.clone())),
        None => {
            println!("That inspection has not been saved to the server yet.\n");
            None
        }
    }
}

/// Option [8]
fn handle_edit() {
    let mut state = lock_state();
    let Some(store) = state.store.as_mut() else {
        println!("No data service configured (set --api-url or INSPECTION_API_URL).\n");
        return;
    };
    let Some((id, record)) = pick_saved_record(store) else {
        return;
    };
    let mut draft = InspectionDraft::from_record(&record);
    fill_draft(&mut draft);
    let updated = match draft.save_edit() {
        Ok(updated) => updated,
        Err(e) => {
            println!("{}\n", e);
            return;
        }
    };
    match store.update(&id, &updated) {
        Ok(()) => println!("Inspection updated.\n"),
        Err(e) => println!("Failed to update inspection: {}\n", e),
    }
}

/// Option [9]
fn handle_delete() {
    let mut state = lock_state();
    let Some(store) = state.store.as_mut() else {
        println!("No data service configured (set --api-url or INSPECTION_API_URL).\n");
        return;
    };
    let Some((id, record)) = pick_saved_record(store) else {
        return;
    };
    let label = record.inspection_id.as_deref().unwrap_or(id.as_str()).to_string();
    if prompt(&format!("Delete inspection {}? (yes/no)", label)) != "yes" {
        println!("Cancelled.\n");
        return;
    }
    match store.delete(&id) {
        Ok(()) => println!("Inspection deleted.\n"),
        Err(e) => println!("Delete failed: {}\n", e),
    }
}

/// Option [10]
fn handle_delete_all() {
    let mut state = lock_state();
    let Some(store) = state.store.as_mut() else {
        println!("No data service configured (set --api-url or INSPECTION_API_URL).\n");
        return;
    };
    if prompt("Delete ALL inspections? (yes/no)") != "yes" {
        println!("Cancelled.\n");
        return;
    }
    match store.delete_all() {
        Ok(()) => println!("All inspections deleted.\n"),
        Err(e) => println!("Delete failed: {}\n", e),
    }
}

fn init(args: Args) -> inspection_dashboard::Result<()> {
    let overrides = Overrides {
        api_url: args.api_url,
        input: args.input,
        output_dir: args.output_dir,
    };
    let settings = Settings::load(args.config.as_deref(), overrides)?;
    let mut watcher = None;
    let store = match &settings.api_url {
        Some(url) => {
            let mut store = InspectionStore::new(HttpDataService::new(url, settings.request_timeout())?);
            if let Err(e) = store.refresh() {
                println!("Failed to load inspection data: {}", e);
            }
            if let Some(interval) = settings.watch_interval() {
                let poller = HttpDataService::new(url, settings.request_timeout())?;
                watcher = Some(ChangeWatcher::spawn(poller, interval, store.notifier()));
            }
            Some(store)
        }
        None => None,
    };
    info!(api = ?settings.api_url, input = %settings.input.display(), "settings resolved");

    let mut state = lock_state();
    state.filters = settings.filters.clone();
    state.settings = settings;
    state.store = store;
    state.watcher = watcher;
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inspection_dashboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = init(Args::parse()) {
        error!(error = %e, "startup failed");
        eprintln!("{}", e);
        std::process::exit(1);
    }

    loop {
        // Apply any change notifications that arrived while idle.
        if let Some(store) = lock_state().store.as_mut() {
            if store.pump_notifications() && store.last_error().is_none() {
                println!("Inspection data changed on the server and was reloaded.\n");
            }
        }

        println!("Select an option:");
        println!("[1] Load the spreadsheet");
        println!("[2] Show dashboard");
        println!("[3] Set dashboard filters");
        println!("[4] Browse inspections");
        println!("[5] Export report");
        println!("[6] Sync with server");
        println!("[7] Add inspection");
        println!("[8] Edit inspection");
        println!("[9] Delete inspection");
        println!("[10] Delete all inspections");
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(),
            "2" => {
                println!();
                handle_dashboard();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => handle_filters(),
            "4" => handle_table(),
            "5" => handle_export(),
            "6" => handle_sync(),
            "7" => handle_add(),
            "8" => handle_edit(),
            "9" => handle_delete(),
            "10" => handle_delete_all(),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-10.\n"),
        }
    }
}
