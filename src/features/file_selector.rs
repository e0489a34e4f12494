//! Interactive pick-list over the Excel files in the input directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;

use crate::cli::Prompter;

const EXCEL_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

#[derive(Debug, Clone)]
pub struct ExcelFile {
    pub path: PathBuf,
    pub name: String,
    pub size_kb: f64,
    pub modified: DateTime<Local>,
}

pub fn format_size(size_kb: f64) -> String {
    if size_kb < 1024.0 {
        format!("{:.1} KB", size_kb)
    } else {
        format!("{:.2} MB", size_kb / 1024.0)
    }
}

pub fn format_date(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

/// What the user typed at the selection prompt.
#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Finish,
    All,
    Indices(Vec<usize>),
    Invalid(String),
}

fn parse_selection(input: &str, count: usize) -> Selection {
    let choice = input.trim().to_lowercase();
    match choice.as_str() {
        "finish" | "exit" | "quit" | "q" => return Selection::Finish,
        "all" => return Selection::All,
        _ => {}
    }
    let parsed: Result<Vec<usize>, _> = choice.split(',').map(|x| x.trim().parse()).collect();
    match parsed {
        Ok(indices) if !indices.is_empty() && indices.iter().all(|i| (1..=count).contains(i)) => {
            Selection::Indices(indices)
        }
        Ok(_) => Selection::Invalid(format!(
            "❌ Invalid selection. Numbers must be between 1 and {}",
            count
        )),
        Err(_) => Selection::Invalid(
            "❌ Invalid format. Use comma-separated numbers, 'all', or 'finish'".to_string(),
        ),
    }
}

pub struct FileSelector {
    input_dir: PathBuf,
}

impl FileSelector {
    pub fn new(input_dir: impl Into<PathBuf>) -> Result<Self> {
        let input_dir = input_dir.into();
        std::fs::create_dir_all(&input_dir)
            .with_context(|| format!("failed to create {}", input_dir.display()))?;
        info!("Input directory: {}", input_dir.display());
        Ok(Self { input_dir })
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// `.xlsx` / `.xls` files, newest first.
    pub fn excel_files(&self) -> Result<Vec<ExcelFile>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.input_dir)
            .with_context(|| format!("failed to list {}", self.input_dir.display()))?
        {
            let path = entry?.path();
            let is_excel = path
                .extension()
                .map(|e| EXCEL_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
                .unwrap_or(false);
            if !path.is_file() || !is_excel {
                continue;
            }
            let meta = std::fs::metadata(&path)?;
            files.push(ExcelFile {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size_kb: meta.len() as f64 / 1024.0,
                modified: meta.modified().map(DateTime::<Local>::from)?,
                path,
            });
        }
        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(files)
    }

    /// List the files and ask which to process. Empty result = nothing chosen.
    pub fn select_files(&self, prompter: &dyn Prompter) -> Result<Vec<PathBuf>> {
        let files = self.excel_files()?;
        if files.is_empty() {
            println!("\n❌ NO EXCEL FILES FOUND");
            println!("\nPlease copy your Excel files to:");
            println!("  📁 {}", self.input_dir.display());
            println!("\nThen run the program again.");
            return Ok(Vec::new());
        }

        println!("\n📊 FOUND {} EXCEL FILE(S)", files.len());
        for (idx, f) in files.iter().enumerate() {
            println!("  [{}] {}", idx + 1, f.name);
            println!(
                "      📏 {:>10} | 📅 {}",
                format_size(f.size_kb),
                format_date(&f.modified)
            );
        }
        println!("\nSelection options:");
        println!("  - Enter numbers separated by commas (e.g., 1,3)");
        println!("  - Enter 'all' to select all files");
        println!("  - Enter 'finish' or 'exit' to quit");

        let mut selected: Vec<PathBuf> = Vec::new();
        loop {
            let answer = prompter.input("Your selection", None)?;
            match parse_selection(&answer, files.len()) {
                Selection::Finish => {
                    if selected.is_empty() {
                        println!("❌ No files selected. Exiting...");
                    } else {
                        println!("\n✅ Selected {} file(s)", selected.len());
                    }
                    return Ok(selected);
                }
                Selection::All => {
                    selected = files.iter().map(|f| f.path.clone()).collect();
                    println!("✅ Selected all {} file(s)", selected.len());
                    return Ok(selected);
                }
                Selection::Indices(indices) => {
                    selected = indices.iter().map(|i| files[i - 1].path.clone()).collect();
                    println!("\n✅ Selected {} file(s):", selected.len());
                    for f in indices.iter().map(|i| &files[i - 1]) {
                        println!("   • {}", f.name);
                    }
                    if !prompter.confirm("Continue selecting?", false)? {
                        return Ok(selected);
                    }
                }
                Selection::Invalid(msg) => {
                    // An exhausted script would otherwise loop forever.
                    if answer.trim().is_empty() {
                        return Ok(selected);
                    }
                    println!("{}", msg);
                }
            }
        }
    }

    /// Move files into `{input_dir}/{processed_dir}`, suffixing `_1`, `_2`… on clashes.
    pub fn move_processed_files(&self, files: &[PathBuf], processed_dir: &str) -> Result<Vec<PathBuf>> {
        let dest_dir = self.input_dir.join(processed_dir);
        std::fs::create_dir_all(&dest_dir)?;
        println!(
            "\n📦 Moving {} processed file(s) to {}/...",
            files.len(),
            processed_dir
        );

        let mut moved = Vec::new();
        for file in files.iter().filter(|f| f.exists()) {
            let name = file.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ext = file
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();

            let mut dest = dest_dir.join(&name);
            let mut counter = 1;
            while dest.exists() {
                dest = dest_dir.join(format!("{}_{}{}", stem, counter, ext));
                counter += 1;
            }
            std::fs::rename(file, &dest)
                .with_context(|| format!("failed to move {}", file.display()))?;
            println!("   ✅ {} → {}/", name.to_string_lossy(), processed_dir);
            moved.push(dest);
        }
        info!("Moved {} files to {}", moved.len(), dest_dir.display());
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ScriptedPrompter;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512.0), "512.0 KB");
        assert_eq!(format_size(2048.0), "2.00 MB");
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("Q", 3), Selection::Finish);
        assert_eq!(parse_selection(" all ", 3), Selection::All);
        assert_eq!(parse_selection("1, 3", 3), Selection::Indices(vec![1, 3]));
        assert!(matches!(parse_selection("4", 3), Selection::Invalid(_)));
        assert!(matches!(parse_selection("x", 3), Selection::Invalid(_)));
    }

    #[test]
    fn test_select_and_move_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xlsx"), b"x").unwrap();
        std::fs::write(dir.path().join("b.XLS"), b"y").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"z").unwrap();

        let selector = FileSelector::new(dir.path()).unwrap();
        assert_eq!(selector.excel_files().unwrap().len(), 2);

        let prompter = ScriptedPrompter::new(["9", "all"]);
        let picked = selector.select_files(&prompter).unwrap();
        assert_eq!(picked.len(), 2);

        std::fs::create_dir_all(dir.path().join("processed")).unwrap();
        std::fs::write(dir.path().join("processed").join("a.xlsx"), b"old").unwrap();
        let moved = selector
            .move_processed_files(&[dir.path().join("a.xlsx")], "processed")
            .unwrap();
        assert_eq!(moved[0], dir.path().join("processed").join("a_1.xlsx"));
        assert!(!dir.path().join("a.xlsx").exists());
    }
}
