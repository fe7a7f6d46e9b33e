//! CSV export for simulation step results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::StepResult;

/// Column header for CSV telemetry export.
const HEADER: &str = "timestep,time,plugged,car_soc,estimated_soc,target_soc,\
                       charging,power_kw,price,outcome,state,buffer_active,\
                       available_current,load_limited,command,departure_soc";

/// Exports simulation results to a CSV file at the given path.
///
/// Writes a header row followed by one data row per tick. Produces
/// deterministic output for identical inputs.
///
/// # Arguments
///
/// * `results` - Complete simulation step results
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[StepResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes simulation results as CSV to any writer.
///
/// Optional values are written as empty fields.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[StepResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in results {
        wtr.write_record(&[
            r.timestep.to_string(),
            r.time.format("%Y-%m-%dT%H:%M").to_string(),
            r.plugged.to_string(),
            format!("{:.3}", r.car_soc),
            format!("{:.3}", r.estimated_soc),
            r.target_soc.to_string(),
            r.charging.to_string(),
            format!("{:.4}", r.power_kw),
            r.price.map(|p| format!("{p:.4}")).unwrap_or_default(),
            r.outcome.to_string(),
            r.state.to_string(),
            r.buffer_active.to_string(),
            r.available_current
                .map(|a| format!("{a:.2}"))
                .unwrap_or_default(),
            r.load_limited.to_string(),
            r.command.map(|c| c.to_string()).unwrap_or_default(),
            r.departure
                .map(|d| format!("{:.3}", d.soc))
                .unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlanOutcome;
    use crate::session::{ActuatorCommand, SessionState};
    use chrono::{Duration, NaiveDate};

    fn make_step(t: usize) -> StepResult {
        let start = NaiveDate::from_ymd_opt(2026, 2, 1)
            .and_then(|d| d.and_hms_opt(13, 30, 0))
            .unwrap();
        StepResult {
            timestep: t,
            time: start + Duration::minutes(15 * t as i64),
            plugged: true,
            car_soc: 47.0,
            estimated_soc: 47.0,
            charging: false,
            power_kw: 0.0,
            price: if t == 0 { None } else { Some(0.75) },
            target_soc: 80,
            outcome: PlanOutcome::Scheduled,
            state: SessionState::Scheduled,
            buffer_active: false,
            available_current: None,
            load_limited: false,
            command: (t == 1).then_some(ActuatorCommand::Start),
            departure: None,
        }
    }

    fn render(results: &[StepResult]) -> String {
        let mut buf = Vec::new();
        write_csv(results, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_columns() {
        let output = render(&[make_step(0)]);
        assert_eq!(
            output.lines().next().unwrap(),
            "timestep,time,plugged,car_soc,estimated_soc,target_soc,\
             charging,power_kw,price,outcome,state,buffer_active,\
             available_current,load_limited,command,departure_soc"
        );
    }

    #[test]
    fn row_count_matches_step_count() {
        let results: Vec<StepResult> = (0..24).map(make_step).collect();
        // 1 header + 24 data rows
        assert_eq!(render(&results).lines().count(), 25);
    }

    #[test]
    fn optional_fields_are_empty() {
        let output = render(&[make_step(0), make_step(1)]);
        let mut rdr = csv::ReaderBuilder::new().from_reader(output.as_bytes());
        let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
        assert_eq!(rows[0].len(), 16);
        assert_eq!(&rows[0][1], "2026-02-01T13:30");
        assert_eq!(&rows[0][8], "");
        assert_eq!(&rows[1][8], "0.7500");
        assert_eq!(&rows[0][12], "");
        assert_eq!(&rows[0][13], "false");
        assert_eq!(&rows[1][14], "start");
        assert_eq!(&rows[1][15], "");
    }
}
