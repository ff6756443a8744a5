use crate::findings::{CodeFinding, ProjectFinding};
use crate::taxonomy::CategoryTaxonomy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Final output of one review.
///
/// `titles` always lists every category of the taxonomy in declared order,
/// whether or not anything was found for it. `code_comments` carries no
/// ordering guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub titles: Vec<String>,
    pub code_comments: Vec<CodeFinding>,
    pub project_comments: Vec<ProjectFinding>,
}

impl Report {
    pub fn empty(taxonomy: &CategoryTaxonomy) -> Self {
        Self {
            titles: taxonomy.titles(),
            code_comments: Vec::new(),
            project_comments: Vec::new(),
        }
    }

    pub fn comments_titled<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a CodeFinding> + 'a {
        self.code_comments.iter().filter(move |c| c.title == title)
    }

    pub fn comments_for_file<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a CodeFinding> + 'a {
        self.code_comments.iter().filter(move |c| c.path == path)
    }

    pub fn is_clean(&self) -> bool {
        self.code_comments.is_empty() && self.project_comments.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn print_summary(&self) {
        println!("📊 Review Summary");
        println!("=================");
        for title in &self.titles {
            let files = self.comments_titled(title).count();
            let project = self.project_comments.iter().filter(|c| &c.title == title).count();
            println!("  {}: {} code, {} project", title, files, project);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Json,
    Markdown,
    All,
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    pub fn export_report(&self, report: &Report, output_dir: &Path, format: ReportFormat) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)?;
        let mut exported_files = Vec::new();

        if matches!(format, ReportFormat::Json | ReportFormat::All) {
            let json_path = output_dir.join("review_report.json");
            fs::write(&json_path, report.to_json()?)?;
            exported_files.push(json_path);
        }

        if matches!(format, ReportFormat::Markdown | ReportFormat::All) {
            let md_path = output_dir.join("review_summary.md");
            fs::write(&md_path, self.generate_markdown_summary(report))?;
            exported_files.push(md_path);
        }

        Ok(exported_files)
    }

    /// Comments grouped by category in `titles` order, then by file and line.
    pub fn generate_markdown_summary(&self, report: &Report) -> String {
        let mut md = format!(
            "# Code Review Summary\n\n**Generated:** {}\n**Code comments:** {}\n**Project comments:** {}\n\n",
            chrono::Utc::now().to_rfc3339(),
            report.code_comments.len(),
            report.project_comments.len()
        );

        for title in &report.titles {
            let project: Vec<_> = report.project_comments.iter().filter(|c| &c.title == title).collect();
            let mut code: Vec<_> = report.comments_titled(title).collect();
            if project.is_empty() && code.is_empty() {
                continue;
            }
            code.sort_by(|a, b| (&a.path, a.start_line).cmp(&(&b.path, b.start_line)));

            md.push_str(&format!("## {}\n\n", title));
            for comment in project {
                md.push_str(&format!("- {}\n", comment.message));
            }
            for comment in code {
                let lines = if comment.start_line == comment.end_line {
                    format!("{}", comment.start_line)
                } else {
                    format!("{}-{}", comment.start_line, comment.end_line)
                };
                md.push_str(&format!("- `{}:{}` {}\n", comment.path, lines, comment.message));
                if let Some(suggestion) = &comment.suggestion {
                    md.push_str(&format!("  - Suggestion: {}\n", suggestion));
                }
            }
            md.push('\n');
        }

        if report.is_clean() {
            md.push_str("No issues found.\n");
        }
        md
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{RawComment, TypedFinding};
    use crate::taxonomy::{LOGGING, STRUCTURE};
    use tempfile::tempdir;

    fn sample_report() -> Report {
        let taxonomy = CategoryTaxonomy::standard();
        let mut report = Report::empty(&taxonomy);
        report.code_comments.push(
            CodeFinding::resolve(
                RawComment::new(LOGGING, 3, 5, "print instead of logger").with_suggestion("use logging"),
                "app/main.py",
                &taxonomy,
            )
            .unwrap(),
        );
        report.project_comments.push(
            ProjectFinding::resolve(TypedFinding::new(STRUCTURE, "Required directory `tests` is missing"), &taxonomy)
                .unwrap(),
        );
        report
    }

    #[test]
    fn test_json_has_flat_field_names() {
        let json: serde_json::Value = serde_json::from_str(&sample_report().to_json().unwrap()).unwrap();
        assert_eq!(json["titles"].as_array().unwrap().len(), 5);
        assert_eq!(json["code_comments"][0]["filepath"], "app/main.py");
        assert_eq!(json["code_comments"][0]["title"], "Logging");
        assert_eq!(json["project_comments"][0]["title"], "Project structure");
        assert_eq!(json["project_comments"][0]["comment"], "Required directory `tests` is missing");
    }

    #[test]
    fn test_markdown_groups_by_title() {
        let md = Reporter::new().generate_markdown_summary(&sample_report());
        let logging = md.find("## Logging").unwrap();
        let structure = md.find("## Project structure").unwrap();
        assert!(logging < structure);
        assert!(md.contains("- `app/main.py:3-5` print instead of logger"));
        assert!(md.contains("  - Suggestion: use logging"));
        assert!(!md.contains("## Code review"));
    }

    #[test]
    fn test_empty_report_markdown() {
        let md = Reporter::new().generate_markdown_summary(&Report::empty(&CategoryTaxonomy::standard()));
        assert!(md.contains("No issues found."));
    }

    #[test]
    fn test_export_formats() {
        let dir = tempdir().unwrap();
        let reporter = Reporter::new();
        let report = sample_report();

        let json_only = reporter.export_report(&report, dir.path(), ReportFormat::Json).unwrap();
        assert_eq!(json_only, vec![dir.path().join("review_report.json")]);

        let all = reporter.export_report(&report, &dir.path().join("out"), ReportFormat::All).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|p| p.exists()));
    }
}
