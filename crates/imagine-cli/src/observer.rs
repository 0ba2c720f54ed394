use colored::Colorize;
use imagine_application::GenerationObserver;
use imagine_infrastructure::BatchSaveReport;
use std::time::Duration;

/// Prints generation progress to the terminal.
pub struct ConsoleObserver;

impl GenerationObserver for ConsoleObserver {
    fn on_log(&mut self, message: &str) {
        println!("{}", message.bright_blue());
    }

    fn on_recoverable_error(&mut self, message: &str, detail: &str) {
        println!("{}", message.red());
        println!("{}", "Skipping to next batch...".bold());
        println!("{}", format!("Developer Info: {detail}").bright_black());
    }

    fn on_images_saved(&mut self, message: &str, report: &BatchSaveReport) {
        println!("{}", message.bright_blue());
        if report.nothing_saved() {
            println!("{}", "Failed to save all images! Continuing...".yellow());
        } else {
            if report.failed > 0 {
                println!(
                    "{}",
                    format!("Failed to save {} image(s)! Continuing...", report.failed).yellow()
                );
            }
            println!(
                "{}",
                format!("Saved {} image(s) out of {}!", report.saved, report.total).bright_green()
            );
        }
    }

    fn on_waiting(&mut self, delay: Duration) {
        println!(
            "{}",
            format!(
                "Waiting {} second(s) before continuing to the next batch to avoid rate limits.",
                delay.as_secs()
            )
            .bright_black()
        );
        println!("This value can be changed in the settings/config menu.");
    }
}
