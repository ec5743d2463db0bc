use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;
use tracing::info;

use crate::{harvest::ResultTable, hero::HeroStatRow};

pub const HEADERS: [&str; 11] = [
    "角色名字",
    "阵营",
    "胜率",
    "选取率",
    "kd",
    "平均伤害",
    "表现分",
    "地图",
    "段位",
    "赛季",
    "时间",
];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("could not prepare output directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write workbook: {0}")]
    Xlsx(#[from] XlsxError),
}

pub fn output_file_name(now: &DateTime<Local>) -> String {
    format!("klbq_data_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

/// Writes the table to `<dir>/klbq_data_<timestamp>.xlsx` and returns the path.
pub fn export_table(table: &ResultTable, dir: &Path) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(output_file_name(&Local::now()));
    write_workbook(table, &path)?;
    info!(path = %path.display(), rows = table.len(), "all data saved");

    Ok(path)
}

pub fn write_workbook(table: &ResultTable, path: &Path) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let bold = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (i, row) in table.rows().iter().enumerate() {
        write_row(sheet, i as u32 + 1, row)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_row(sheet: &mut Worksheet, r: u32, row: &HeroStatRow) -> Result<(), XlsxError> {
    sheet.write_string(r, 0, &row.hero_name)?;
    sheet.write_string(r, 1, row.side.label())?;
    sheet.write_number(r, 2, row.win_rate)?;
    sheet.write_number(r, 3, row.select_rate)?;
    sheet.write_number(r, 4, row.kd)?;
    sheet.write_number(r, 5, row.avg_damage)?;
    sheet.write_number(r, 6, row.score)?;
    sheet.write_string(r, 7, &row.map_name)?;
    sheet.write_string(r, 8, &row.rank_name)?;
    sheet.write_string(r, 9, &row.season)?;
    sheet.write_string(r, 10, &row.timestamp)?;
    Ok(())
}
