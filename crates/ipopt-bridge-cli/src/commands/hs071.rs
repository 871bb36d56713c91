use std::path::PathBuf;

use ipopt_bridge::demo::Hs071;
use ipopt_bridge::{OptionValue, SolverOptions};

use crate::cli::ReportFormat;

#[cfg_attr(not(feature = "native"), allow(dead_code))]
pub struct Hs071Args {
    pub options: SolverOptions,
    pub warm_start: bool,
    pub format: ReportFormat,
    pub output_file: Option<PathBuf>,
    pub print_level: i32,
}

/// HS071 defaults, overridden by the options file, overridden by flags.
pub fn resolve_options(
    file: SolverOptions,
    overrides: Vec<(String, OptionValue)>,
) -> SolverOptions {
    let mut options = Hs071::default_options();
    options.merge(file);
    for (key, value) in overrides {
        options.insert(key, value);
    }
    options
}

#[cfg(not(feature = "native"))]
pub fn handle(_args: Hs071Args) -> anyhow::Result<()> {
    tracing::error!("IPOPT is not available - this binary was built without the `native` feature");
    eprintln!("Rebuild with: cargo build -p ipopt-bridge-cli --features native");
    anyhow::bail!("no native solver linked")
}

#[cfg(feature = "native")]
pub use linked::handle;

#[cfg(feature = "native")]
mod linked {
    use std::fmt::Write as _;
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Context, Result};
    use ipopt_bridge::demo::{Hs071, M, N};
    use ipopt_bridge::{
        DispatchTable, IpoptProblem, Iterate, Number, Outcome, SolveStatus, StatusError,
    };
    use serde::Serialize;
    use tracing::info;

    use super::Hs071Args;
    use crate::cli::ReportFormat;

    #[derive(Debug, Serialize)]
    pub(super) struct RunReport {
        pub label: &'static str,
        pub status: SolveStatus,
        pub outcome: Outcome,
        pub code: i32,
        pub objective: Number,
        pub iterate: Iterate,
    }

    pub fn handle(args: Hs071Args) -> Result<()> {
        let shared = Arc::new(Mutex::new(Hs071::default()));
        let mut problem = IpoptProblem::new(
            Hs071::variable_bounds(),
            Hs071::constraint_bounds(),
            Hs071::sparsity(),
            DispatchTable::from_shared(Arc::clone(&shared)),
        )?;

        args.options.apply(&mut problem)?;
        if let Some(path) = &args.output_file {
            problem.open_output_file(path, args.print_level)?;
        }

        let mut iterate = Iterate::new(N, M)
            .with_point(Hs071::starting_point())
            .with_constraint_values();
        let mut reports = vec![solve_once(&mut problem, "initial", &mut iterate)?];

        if args.warm_start && reports[0].status.is_success() {
            shared
                .lock()
                .map_err(|_| anyhow!("evaluator lock poisoned"))?
                .g_offset[0] = 0.2;
            Hs071::warm_start_options().apply(&mut problem)?;
            info!("re-solving with shifted constraint from the previous iterate");
            reports.push(solve_once(&mut problem, "warm start", &mut iterate)?);
        }
        problem.release();

        match args.format {
            ReportFormat::Text => print!("{}", render_text(&reports)),
            ReportFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&reports).context("encoding report")?
            ),
        }

        match reports.last() {
            Some(last) if !last.status.is_success() => Err(ipopt_bridge::Error::from(StatusError {
                status: last.status,
                code: last.code,
                description: last.status.description(),
            })
            .into()),
            _ => Ok(()),
        }
    }

    fn solve_once(
        problem: &mut IpoptProblem,
        label: &'static str,
        iterate: &mut Iterate,
    ) -> Result<RunReport> {
        let (status, code) = match problem.solve(iterate) {
            Ok(_) => (SolveStatus::SolveSucceeded, 0),
            Err(ipopt_bridge::Error::Terminated(e)) => (e.status, e.code),
            Err(e) => return Err(e.into()),
        };
        Ok(RunReport {
            label,
            status,
            outcome: status.outcome(),
            code,
            objective: iterate.objective,
            iterate: iterate.clone(),
        })
    }

    pub(super) fn render_text(reports: &[RunReport]) -> String {
        let mut out = String::new();
        for report in reports {
            let _ = writeln!(out, "== {} ==", report.label);
            let _ = writeln!(
                out,
                "status:    {:?} (code {}, {:?})",
                report.status, report.code, report.outcome
            );
            let _ = writeln!(out, "objective: {:e}", report.objective);
            let it = &report.iterate;
            for (i, x) in it.point.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "x[{i}] = {x:e}  z_L = {:e}  z_U = {:e}",
                    it.lower_bound_multipliers[i], it.upper_bound_multipliers[i]
                );
            }
            if let Some(g) = &it.constraint_values {
                for (i, value) in g.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "g[{i}] = {value:e}  lambda = {:e}",
                        it.constraint_multipliers[i]
                    );
                }
            }
        }
        out
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn report() -> RunReport {
            let mut iterate = Iterate::new(N, M)
                .with_point(vec![1.0, 4.743, 3.821, 1.379])
                .with_constraint_values();
            iterate.objective = 17.014;
            RunReport {
                label: "initial",
                status: SolveStatus::SolveSucceeded,
                outcome: Outcome::Success,
                code: 0,
                objective: 17.014,
                iterate,
            }
        }

        #[test]
        fn test_text_report_lists_every_entry() {
            let text = render_text(&[report()]);
            assert!(text.starts_with("== initial ==\n"));
            assert_eq!(text.lines().filter(|l| l.starts_with("x[")).count(), N);
            assert_eq!(text.lines().filter(|l| l.starts_with("g[")).count(), M);
        }

        #[test]
        fn test_json_report_shape() {
            let json = serde_json::to_value([report()]).unwrap();
            assert_eq!(json[0]["status"], "SolveSucceeded");
            assert_eq!(json[0]["code"], 0);
            assert_eq!(json[0]["iterate"]["point"].as_array().map(Vec::len), Some(N));
        }
    }
}
