use crate::comparisons::ComparisonTable;
use crate::config::ClusterConfig;
use crate::console::Console;
use crate::estimator::EmissionsResult;

const METHODOLOGY: &str = "Estimates use the methodology of the Green Algorithms project \
    (https://www.green-algorithms.org/, https://doi.org/10.1002/advs.202100707)";

pub(crate) fn summary_lines(result: &EmissionsResult) -> Vec<String> {
    let job = &result.job;
    vec![
        format!(
            "Estimated energy consumed from {:.2} CPU-hours and {:.2} GPU-hours and {:.2} GB-hours is {:.2} kWh",
            job.cputime,
            job.gpu_hours(),
            job.memory_hours(),
            result.energy_consumed
        ),
        format!(
            "Carbon intensity for {} is {} gCO2e/kWh",
            job.start_time.format("%Y-%m-%d %H:%M UTC"),
            result.carbon_intensity
        ),
        format!("Estimated emissions is {:.0} gCO2e", result.emissions.round()),
    ]
}

fn region_description(config: &ClusterConfig) -> String {
    match config.intensity.region_id {
        Some(region_id) => format!("the average of grid region {region_id}"),
        None => "the national grid average".to_string(),
    }
}

pub(crate) fn print_details(config: &ClusterConfig, result: &EmissionsResult) {
    let node = &result.node;
    let job = &result.job;

    Console::title("Cluster information:");
    Console::info("Name", &config.cluster_name);
    Console::info("PUE", &config.pue.to_string());

    Console::title("Job information:");
    Console::info("ID", &job.id);
    Console::info("Start time", &job.start_time.to_rfc3339());
    Console::info("Runtime", &format!("{:.2} h", job.runtime));
    Console::info("CPU time", &format!("{:.2} core-h", job.cputime));
    if let Some(ncpus) = job.ncpus {
        Console::info("CPU cores", &ncpus.to_string());
    }
    if let Some(cpu_percent) = job.cpu_percent {
        Console::info("CPU usage", &format!("{cpu_percent}%"));
    }
    Console::info("GPUs", &job.ngpus.to_string());
    Console::info("Memory", &format!("{} GB", job.memory));

    Console::title("Node information:");
    Console::info("Name", &node.name);
    Console::info("CPU model", &node.cpu_type);
    Console::info("GPU model", node.gpu_type.as_deref().unwrap_or("None"));
    Console::info("Memory type", &node.mem_type);
    Console::info(
        "CPU power draw (per core)",
        &format!("{} W", node.per_core_power_watts),
    );
    Console::info(
        "GPU power draw (per GPU)",
        &format!("{} W", node.per_gpu_power_watts),
    );
    Console::info(
        "Memory power draw (per GB)",
        &format!("{} W", node.per_gb_power_watts),
    );

    Console::title("Calculation information:");
    Console::item(
        "Estimate is for scope 2 emissions only (i.e., indirect emissions due to purchased electricity).",
    );
    Console::item(&format!(
        "Estimate is performed AS IF carbon intensity was {} at job start time.",
        region_description(config)
    ));
    Console::item(METHODOLOGY);
}

pub(crate) fn print_summary(result: &EmissionsResult) {
    for line in summary_lines(result) {
        Console::line(&line);
    }
}

pub(crate) fn print_comparisons(table: &ComparisonTable, emissions: f64) {
    Console::section(&format!("{} Comparisons", table.kind()));
    Console::line("Equivalent to:");
    for equivalent in table.equivalents(emissions) {
        Console::item(&table.describe(&equivalent));
    }
}
