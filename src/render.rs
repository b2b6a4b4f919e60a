// Terminal rendering for the blocks the view produces. Styling goes through
// crossterm; tests render with styling off and compare plain text.

use crossterm::style::Stylize;

use crate::table::Tabular;

/// Longest cell shown before truncation.
const MAX_CELL_WIDTH: usize = 40;

/// A grid of already-formatted cells, detached from its source table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn of<T: Tabular + ?Sized>(table: &T) -> Self {
        let columns = table.columns().to_vec();
        let rows = (0..table.row_count())
            .map(|r| (0..columns.len()).map(|c| table.cell(r, c)).collect())
            .collect();
        TableView { columns, rows }
    }
}

/// One rendered element of the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Markdown(String),
    Subheader(String),
    Table(TableView),
    Caption(String),
    Divider,
    /// Generic failure notice. Nothing after it renders for the interaction.
    Error(String),
}

impl Block {
    pub fn table<T: Tabular + ?Sized>(table: &T) -> Self {
        Block::Table(TableView::of(table))
    }
}

/// Blocks accumulated while handling one interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    blocks: Vec<Block>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn subheaders(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Subheader(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tables(&self) -> Vec<&TableView> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn error(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Error(e) => Some(e.as_str()),
            _ => None,
        })
    }
}

pub fn render_block(block: &Block, styled: bool) -> String {
    match block {
        Block::Title(t) if styled => format!("{}\n", t.as_str().bold().underlined()),
        Block::Title(t) => format!("{t}\n"),
        Block::Markdown(m) => format!("{m}\n"),
        Block::Subheader(s) if styled => format!("{}", s.as_str().bold().cyan()),
        Block::Subheader(s) => s.clone(),
        Block::Table(t) => render_table(t),
        Block::Caption(c) if styled => format!("{}", c.as_str().dim()),
        Block::Caption(c) => c.clone(),
        Block::Divider => "-".repeat(40),
        Block::Error(e) if styled => format!("{} {}", "Error:".red().bold(), e),
        Block::Error(e) => format!("Error: {e}"),
    }
}

fn truncate(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_string();
    }
    let mut out: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
    out.push('…');
    out
}

/// Dataframe-style grid with a leading row index column.
pub fn render_table(table: &TableView) -> String {
    let header: Vec<String> = std::iter::once(String::new())
        .chain(table.columns.iter().map(|c| truncate(c)))
        .collect();
    let body: Vec<Vec<String>> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            std::iter::once(i.to_string())
                .chain(row.iter().map(|c| truncate(c)))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{:<w$}", c, w = w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(&header)];
    out.push(
        widths
            .iter()
            .map(|&w| "-".repeat(w.max(1)))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.extend(body.iter().map(|r| line(r)));
    if table.rows.is_empty() {
        out.push("(no rows)".to_string());
    }
    out.join("\n")
}
