use crate::pipeline::PipelineOutcome;
use crate::Result;
use std::fmt::Write as _;
use std::path::Path;

/// Render the run summary as plain text.
pub fn generate_text_report(outcome: &PipelineOutcome) -> String {
    let mut output = String::new();

    // writeln! into a String cannot fail
    let _ = writeln!(&mut output, "Guide Selection Report");
    let _ = writeln!(&mut output, "======================");
    let _ = writeln!(
        &mut output,
        "Generated: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(&mut output);

    let _ = writeln!(&mut output, "Stages");
    let _ = writeln!(&mut output, "------");
    for stage in &outcome.stages {
        let _ = writeln!(
            &mut output,
            "- {:12} {:8} in  {:8} out  {:8} discarded",
            stage.name, stage.input, stage.output, stage.discarded
        );
    }
    let _ = writeln!(&mut output);
    let _ = writeln!(
        &mut output,
        "Surviving candidates: {}",
        outcome.candidates.len()
    );

    output
}

/// Write the run summary under the output directory as `report.txt`.
pub fn write_report(outcome: &PipelineOutcome, output_dir: &Path) -> Result<()> {
    let report = generate_text_report(outcome);
    std::fs::write(output_dir.join("report.txt"), report)?;
    Ok(())
}
