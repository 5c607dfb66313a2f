use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::admin::UserLevel;
use crate::dex::DexView;
use crate::models::UserSummary;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }

    /// Pick a format from a file name's extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

/// Dex row for export
#[derive(Debug, Serialize)]
pub struct ExportedEntry {
    pub id: i64,
    pub common_name: String,
    pub scientific_name: String,
    pub category: String,
    pub locked: bool,
    pub photos: u32,
}

/// Player row for export
#[derive(Debug, Serialize)]
pub struct ExportedUser {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub unlocked_animals: u32,
    pub uploaded_photos: u32,
    pub level: String,
    pub created_at: Option<String>,
    pub last_activity: Option<String>,
}

/// File name like `animaldex-dex-20240501-101530.csv`.
pub fn default_file_name(kind: &str, format: ExportFormat) -> String {
    format!(
        "animaldex-{}-{}.{}",
        kind,
        Local::now().format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

pub fn default_path(dir: &Path, kind: &str, format: ExportFormat) -> PathBuf {
    dir.join(default_file_name(kind, format))
}

/// Export the reconciled dex to a file
pub fn export_dex(view: &DexView, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let rows: Vec<ExportedEntry> = view
        .entries
        .iter()
        .map(|item| ExportedEntry {
            id: item.entry.id,
            common_name: item.entry.common_name.clone(),
            scientific_name: item.entry.scientific_name.clone(),
            category: item.entry.category_label().to_string(),
            locked: item.locked,
            photos: item.photo_count,
        })
        .collect();

    write_rows(&rows, output_path, format)?;
    tracing::info!(path = %output_path.display(), rows = rows.len(), format = format.name(), "Exported dex");
    Ok(rows.len())
}

/// Export the admin user list to a file
pub fn export_users(users: &[UserSummary], output_path: &Path, format: ExportFormat) -> Result<usize> {
    let rows: Vec<ExportedUser> = users
        .iter()
        .map(|u| ExportedUser {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            unlocked_animals: u.unlocked_animals,
            uploaded_photos: u.uploaded_photos,
            level: UserLevel::of(u).to_string(),
            created_at: u.created_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            last_activity: u.last_activity.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        })
        .collect();

    write_rows(&rows, output_path, format)?;
    tracing::info!(path = %output_path.display(), rows = rows.len(), format = format.name(), "Exported users");
    Ok(rows.len())
}

fn write_rows<T: Serialize>(rows: &[T], output_path: &Path, format: ExportFormat) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    match format {
        ExportFormat::Json => export_json(rows, output_path),
        ExportFormat::Csv => export_csv(rows, output_path),
    }
    .with_context(|| format!("writing {}", output_path.display()))
}

fn export_json<T: Serialize>(rows: &[T], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv<T: Serialize>(rows: &[T], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    // Headers come from the row's field names
    for row in rows {
        wtr.serialize(row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::tests::{entry, record};
    use crate::dex::CatalogSnapshot;
    use crate::models::UnlockStatus;

    fn view() -> DexView {
        DexView::build(&CatalogSnapshot::new(
            vec![entry(1, "Isard", "Mammal"), entry(2, "Tritó, pirinenc", "")],
            vec![record(10, 1, UnlockStatus::Unlocked, 2)],
        ))
    }

    #[test]
    fn test_export_dex_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dex.csv");
        assert_eq!(export_dex(&view(), &path, ExportFormat::Csv).unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("id,common_name,scientific_name,category,locked,photos")
        );
        assert_eq!(lines.next(), Some("1,Isard,Isard sp.,Mammal,false,2"));
        assert_eq!(
            lines.next(),
            Some("2,\"Tritó, pirinenc\",\"Tritó, pirinenc sp.\",Uncategorised,true,0")
        );
    }

    #[test]
    fn test_export_users_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.json");
        let users: Vec<UserSummary> = serde_json::from_str(
            r#"[{"id":1,"name":"marta","email":"m@dex.cat","unlockedAnimals":10,"uploadedPhotos":1,"createdAt":"2024-01-02T03:04:05"}]"#,
        )
        .unwrap();

        assert_eq!(export_users(&users, &path, ExportFormat::Json).unwrap(), 1);
        let rows: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rows[0]["name"], "marta");
        assert_eq!(rows[0]["level"], "Expert");
        assert_eq!(rows[0]["created_at"], "2024-01-02 03:04:05");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("a.CSV")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("a.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("a")), ExportFormat::Json);
        assert!(default_file_name("dex", ExportFormat::Csv).ends_with(".csv"));
    }
}
