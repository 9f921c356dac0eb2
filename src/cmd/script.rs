//! `mindshift script` — inspect and lint the treatment scripts.

use anyhow::Result;
use console::style;

use mindshift::catalog::{ExpectedInput, Modality, SemanticContract, Step, Transition};
use mindshift::config::MindshiftToml;

use super::super::ScriptCommands;

pub fn cmd_script(config: &MindshiftToml, command: Option<ScriptCommands>) -> Result<()> {
    let catalog = config.catalog()?;

    match command {
        None | Some(ScriptCommands::List) => {
            println!();
            println!(
                "  {}",
                style(format!(
                    "{:<20} {:<21} {:>6} {:>6} {:>4}  {}",
                    "MODALITY", "WORK TYPE", "PHASES", "STEPS", "CAP", "FALLBACK"
                ))
                .bold()
            );
            for modality in catalog.modalities() {
                let script = catalog.script(modality)?;
                let steps: usize = script.phases.iter().map(|p| p.steps.len()).sum();
                println!(
                    "  {:<20} {:<21} {:>6} {:>6} {:>4}  {}",
                    modality.to_string(),
                    modality.work_type().noun(),
                    script.phases.len(),
                    steps,
                    script.cycle_cap,
                    script.fallback_step
                );
            }
            println!();
        }
        Some(ScriptCommands::Show { modality }) => {
            let modality: Modality = modality.parse()?;
            let script = catalog.script(modality)?;
            println!();
            println!(
                "  {} {}",
                style(modality.to_string()).cyan().bold(),
                style(format!(
                    "(works on a {}, cycle cap {}, fallback {})",
                    modality.work_type().noun(),
                    script.cycle_cap,
                    script.fallback_step
                ))
                .dim()
            );
            for phase in &script.phases {
                println!();
                println!("  {}  {}", style(&phase.id).bold(), phase.title);
                for step in &phase.steps {
                    println!(
                        "    {}  [{}]  {}",
                        style(&step.id).cyan(),
                        describe_expected(step),
                        describe_transition(&step.transition)
                    );
                    for line in textwrap::fill(&step.prompt, 72).lines() {
                        println!("        {}", style(line).dim());
                    }
                }
            }
            println!();
        }
        Some(ScriptCommands::Lint) => {
            let defects = catalog.lint();
            if defects.is_empty() {
                println!("{}", style("No defects found.").green());
            } else {
                for defect in &defects {
                    println!("{} {}", style("defect:").red().bold(), defect);
                }
                anyhow::bail!("Script lint found {} defect(s)", defects.len());
            }
        }
    }
    Ok(())
}

fn describe_expected(step: &Step) -> String {
    match &step.expected {
        ExpectedInput::FreeText { contract: None } => "free text".to_string(),
        ExpectedInput::FreeText {
            contract: Some(contract),
        } => match contract {
            SemanticContract::ProblemStatement => "free text: a problem".to_string(),
            SemanticContract::GoalStatement => "free text: a goal".to_string(),
            SemanticContract::SingleNegativeExperience => {
                "free text: a negative experience".to_string()
            }
        },
        ExpectedInput::YesNo => "yes / no".to_string(),
        ExpectedInput::Choice { options, .. } => format!("choice of {}", options.len()),
    }
}

fn describe_transition(transition: &Transition) -> String {
    match transition {
        Transition::To { step } => format!("-> {step}"),
        Transition::YesNo {
            yes,
            no,
            counts_cycle,
        } => {
            let mut text = format!("yes -> {yes}, no -> {no}");
            if let Some(arm) = counts_cycle {
                text.push_str(&format!(" ({} counts toward the cap)", arm.as_str()));
            }
            text
        }
        Transition::End => "end of session".to_string(),
    }
}
