use std::path::Path;

use bytesize::ByteSize;
use color_eyre::eyre::Result;

use crate::cli::{ExportFormat, HistoryCommands};
use crate::config::UserConfig;
use crate::data::{
    build_report, format_hours_minutes, ActivityRecord, GraphGeometry, LogStore, Slot, Viewport,
    Zoom,
};

const GRAPH_ROWS: usize = 10;
const LABEL_WIDTH: usize = 6;

pub fn run(command: Option<HistoryCommands>) -> Result<()> {
    let config = UserConfig::load();
    let cmd = command.unwrap_or(HistoryCommands::Summary { serial: None });
    let db_path = config.history.database_path();
    let resolve = |serial: Option<String>| serial.unwrap_or_else(|| config.resolve_device_serial());

    match cmd {
        HistoryCommands::Summary { serial } => {
            print_summary(&db_path, &resolve(serial), &config.graph);
        }
        HistoryCommands::Graph {
            zoom,
            page,
            width,
            serial,
        } => {
            let serial = resolve(serial);
            let report = build_report(&db_path, &serial, &config.graph);

            let mut viewport = Viewport::default();
            viewport.set_zoom(zoom);
            viewport.set_page(page, &config.graph);

            let visible: Vec<_> = viewport.visible(&report.timeline, &config.graph).collect();

            println!(
                "{} - {} (page {}/{})",
                zoom.title(),
                serial,
                viewport.page(),
                viewport.max_page(&config.graph)
            );
            for line in render_graph(&visible, &config.graph, zoom, width.max(4), GRAPH_ROWS) {
                println!("{line}");
            }
            println!();
            println!(
                "Now {}   Session {}   Full in {}   Best {}",
                report.current_percent_label(),
                report.elapsed_label(),
                report.remaining_label().unwrap_or_else(|| "--".to_string()),
                report.best_session_label()
            );
            println!("# discharging   + charging   : forecast");
        }
        HistoryCommands::Export {
            output,
            format,
            all,
        } => {
            let store = match LogStore::open(&db_path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Failed to open battery log: {}", e);
                    eprintln!("Make sure the daemon has been running to collect data.");
                    std::process::exit(1);
                }
            };

            let serials = if all {
                store.device_serials()?
            } else {
                vec![config.resolve_device_serial()]
            };

            let mut records = Vec::new();
            for serial in &serials {
                let mut cursor = store.query_activity(serial)?;
                records.extend(cursor.records()?);
            }
            store.close();

            let content = match format {
                ExportFormat::Json => export_to_json(&records)?,
                ExportFormat::Csv => export_to_csv(&records),
            };

            if let Some(path) = output {
                std::fs::write(&path, &content)?;
                println!("Exported {} records to: {}", records.len(), path.display());
            } else {
                println!("{}", content);
            }
        }
        HistoryCommands::Stats => print_stats(&db_path)?,
    }

    Ok(())
}

fn print_summary(db_path: &Path, serial: &str, geometry: &GraphGeometry) {
    let report = build_report(db_path, serial, geometry);

    println!("Battery History ({})", report.device_serial);
    println!("{}", "=".repeat(50));

    if report.timeline.is_empty() {
        println!("No data for this device.");
        println!("\nMake sure the daemon is running to collect data:");
        println!("  batmon daemon start");
        return;
    }

    let state = if report.is_charging() {
        "charging"
    } else {
        "discharging"
    };
    println!("Current level:    {}", report.current_percent_label());
    println!("Session:          {} {}", report.elapsed_label(), state);
    match report.remaining_label() {
        Some(remaining) => println!("Time to full:     {}", remaining),
        None if report.is_charging() => println!("Time to full:     not enough data"),
        None => {}
    }
    println!("Best session:     {}", report.best_session_label());
}

fn print_stats(db_path: &Path) -> Result<()> {
    let store = LogStore::open(db_path)?;

    println!("Battery Log");
    println!("{}", "=".repeat(50));
    println!("Path:    {}", store.path().display());
    println!("Size:    {}", ByteSize::b(store.size_bytes()));

    let serials = store.device_serials()?;
    if serials.is_empty() {
        println!("No devices recorded yet.");
    } else {
        println!();
        println!("{:<32} {:>10} {:>12}", "Device", "Records", "Best");
        println!("{}", "-".repeat(56));
        for serial in &serials {
            let count = store.count_activity(serial)?;
            let best = store.get_best_session(serial)?;
            println!(
                "{:<32} {:>10} {:>12}",
                truncate_str(serial, 32),
                count,
                format_hours_minutes(best)
            );
        }
    }

    store.close();
    Ok(())
}

/// Downsample visible slots into a bar chart of `columns` by `rows` cells.
fn render_graph(
    visible: &[Option<&Slot>],
    geometry: &GraphGeometry,
    zoom: Zoom,
    columns: usize,
    rows: usize,
) -> Vec<String> {
    let n = visible.len();
    let cells: Vec<Option<(usize, char)>> = (0..columns)
        .map(|c| {
            let start = c * n / columns;
            let end = ((c + 1) * n / columns).max(start + 1).min(n);
            let slot = visible.get(start..end)?.iter().rev().find_map(|s| *s)?;
            let filled = (height_to_level(slot.height, geometry) as usize * rows + 50) / 100;
            let glyph = if slot.estimated {
                ':'
            } else if slot.charging {
                '+'
            } else {
                '#'
            };
            Some((filled, glyph))
        })
        .collect();

    let mut lines = Vec::with_capacity(rows + 2);
    for row in (0..rows).rev() {
        let label = if row == rows - 1 {
            "100%"
        } else if row == rows / 2 {
            "50%"
        } else if row == 0 {
            "0%"
        } else {
            ""
        };
        let bar: String = cells
            .iter()
            .map(|cell| match cell {
                Some((filled, glyph)) if row < *filled => *glyph,
                _ => ' ',
            })
            .collect();
        lines.push(format!("{:>width$}|{}", label, bar, width = LABEL_WIDTH - 1));
    }

    lines.push(format!(
        "{}+{}",
        " ".repeat(LABEL_WIDTH - 1),
        axis_ticks(geometry, zoom, columns)
    ));
    lines.push(format!(
        "{}{}",
        " ".repeat(LABEL_WIDTH),
        axis_labels(zoom, columns)
    ));
    lines
}

fn height_to_level(height: i32, geometry: &GraphGeometry) -> i32 {
    let range = geometry.height.max(1);
    ((geometry.top + range - height) * 100 / range).clamp(0, 100)
}

/// `-` axis with a `+` at every zoom segment boundary.
fn axis_ticks(geometry: &GraphGeometry, zoom: Zoom, columns: usize) -> String {
    let segment_slots = geometry.pixel_offset(zoom.segment_secs()) / zoom.step();
    let segment_cols = (segment_slots * columns / geometry.width.max(1)).max(1);
    (1..=columns)
        .map(|c| if c % segment_cols == 0 { '+' } else { '-' })
        .collect()
}

fn axis_labels(zoom: Zoom, columns: usize) -> String {
    let mut line = vec![' '; columns];
    let labels = zoom.axis_labels();
    for (i, label) in labels.iter().enumerate() {
        let end = columns * (i + 1) / labels.len();
        let start = end.saturating_sub(label.len());
        for (offset, ch) in label.chars().enumerate() {
            if let Some(cell) = line.get_mut(start + offset) {
                *cell = ch;
            }
        }
    }
    line.into_iter().collect::<String>().trim_end().to_string()
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn export_to_json(records: &[ActivityRecord]) -> Result<String> {
    let export_data = serde_json::json!({
        "exported_at": chrono::Utc::now().to_rfc3339(),
        "order": "newest_first",
        "records": records,
    });
    Ok(serde_json::to_string_pretty(&export_data)?)
}

fn export_to_csv(records: &[ActivityRecord]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# batmon activity export: {}\n",
        chrono::Utc::now().to_rfc3339()
    ));
    output.push_str("device_serial,level,duration_secs,charging\n");
    for record in records {
        output.push_str(&format!(
            "{},{},{},{}\n",
            escape_csv(&record.device_serial),
            record.level,
            record.duration,
            record.charging
        ));
    }

    output
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        let escaped = s.replace('"', "\"\"").replace('\n', " ");
        format!("\"{}\"", escaped)
    } else {
        s.to_string()
    }
}
