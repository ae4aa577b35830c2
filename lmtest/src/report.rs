use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub category: String,
    pub passed: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Summary statistics for a test category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Target information collected during session setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInfo {
    pub host: String,
    pub place: Option<String>,
    pub target: String,
    pub firmware: String,
}

/// Complete test report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub test_id: String,
    pub timestamp: DateTime<Utc>,
    pub target_info: TargetInfo,
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub duration_ms: u64,
    pub test_results: Vec<TestResult>,
    pub category_stats: Vec<CategoryStats>,
    pub recommendations: Vec<String>,
}

impl TestReport {
    pub fn new(target_info: TargetInfo) -> Self {
        Self {
            test_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            target_info,
            tests_run: 0,
            tests_passed: 0,
            tests_failed: 0,
            duration_ms: 0,
            test_results: Vec::new(),
            category_stats: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn add_test_result(&mut self, result: TestResult) {
        self.tests_run += 1;
        if result.passed {
            self.tests_passed += 1;
        } else {
            self.tests_failed += 1;
        }
        self.test_results.push(result);
    }

    pub fn calculate_stats(&mut self) {
        let mut category_map: std::collections::HashMap<String, CategoryStats> =
            std::collections::HashMap::new();

        for result in &self.test_results {
            let stat = category_map
                .entry(result.category.clone())
                .or_insert_with(|| CategoryStats {
                    category: result.category.clone(),
                    total: 0,
                    passed: 0,
                    failed: 0,
                    duration_ms: 0,
                });

            stat.total += 1;
            stat.duration_ms += result.duration_ms;

            if result.passed {
                stat.passed += 1;
            } else {
                stat.failed += 1;
            }
        }

        self.category_stats = category_map.into_values().collect();

        self.generate_recommendations();
    }

    fn generate_recommendations(&mut self) {
        self.recommendations.clear();

        if self.tests_failed > self.tests_passed {
            self.recommendations.push(
                "Majority of tests failed. Check that the firmware image carries the shared-state-async package.".to_string(),
            );
        }

        for stat in &self.category_stats {
            if stat.failed == 0 {
                continue;
            }
            match stat.category.as_str() {
                "Mesh" => self.recommendations.push(
                    "Mesh checks are failing. Verify the vwifi server is running on the host."
                        .to_string(),
                ),
                "SharedState" => self.recommendations.push(
                    "Shared-state checks are failing. Inspect /tmp/vwifi-client.log on the target."
                        .to_string(),
                ),
                category => self.recommendations.push(format!(
                    "{category} tests are failing. Focus on debugging this area."
                )),
            }
        }
    }

    pub fn print_summary(&self) {
        use colored::*;

        println!(
            "\n{separator}",
            separator = "═══════════════════════════════════════════════════════".bold()
        );
        println!(
            "{title}",
            title = "                   TEST REPORT SUMMARY                  "
                .bold()
                .cyan()
        );
        println!(
            "{separator}",
            separator = "═══════════════════════════════════════════════════════".bold()
        );

        println!("\n{section}", section = "Target Information:".bold());
        println!("  Host: {host}", host = self.target_info.host);
        if let Some(place) = &self.target_info.place {
            println!("  Place: {place}");
        }
        println!("  Target: {target}", target = self.target_info.target);
        println!("  Firmware: {firmware}", firmware = self.target_info.firmware);

        println!("\n{section}", section = "Test Results:".bold());
        println!("  Total Tests: {total}", total = self.tests_run);
        println!(
            "  Passed: {passed} {percentage}",
            passed = self.tests_passed,
            percentage = format!(
                "({percent}%)",
                percent = self.tests_passed * 100 / self.tests_run.max(1)
            )
            .green()
        );
        println!(
            "  Failed: {failed} {percentage}",
            failed = self.tests_failed,
            percentage = if self.tests_failed > 0 {
                format!(
                    "({percent}%)",
                    percent = self.tests_failed * 100 / self.tests_run.max(1)
                )
                .red()
            } else {
                "".normal()
            }
        );
        println!(
            "  Duration: {duration}",
            duration =
                humantime::format_duration(std::time::Duration::from_millis(self.duration_ms))
        );

        if !self.category_stats.is_empty() {
            println!("\n{section}", section = "Categories:".bold());
            let mut table = comfy_table::Table::new();
            table
                .load_preset(comfy_table::presets::UTF8_FULL)
                .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
                .set_header(vec!["Category", "Total", "Passed", "Failed", "Duration"]);
            for stat in &self.category_stats {
                table.add_row(vec![
                    stat.category.clone(),
                    stat.total.to_string(),
                    stat.passed.to_string(),
                    stat.failed.to_string(),
                    format!("{duration}ms", duration = stat.duration_ms),
                ]);
            }
            println!("{table}");
        }

        if !self.recommendations.is_empty() {
            println!("\n{section}", section = "Recommendations:".bold().yellow());
            for rec in &self.recommendations {
                println!("  • {rec}");
            }
        }

        println!(
            "\n{}",
            "═══════════════════════════════════════════════════════".bold()
        );
    }
}
