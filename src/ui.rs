use anyhow::Result;
use finance_dashboard::db::SpendingEntry;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::collections::HashMap;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Register,
    Categories,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Register => Page::Categories,
            Page::Categories => Page::Register,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Register => "Register",
            Page::Categories => "Categories",
        }
    }
}

pub struct App {
    pub entries: Vec<SpendingEntry>,
    pub filtered_entries: Vec<SpendingEntry>,
    pub categories: Vec<String>,
    pub state: TableState,
    pub categories_state: TableState,
    pub total_count: i64,
    pub current_page: Page,
    /// Index into `categories`; None = show everything
    pub category_filter: Option<usize>,
}

impl App {
    pub fn new(entries: Vec<SpendingEntry>, categories: Vec<String>, total_count: i64) -> Self {
        let mut state = TableState::default();
        if !entries.is_empty() {
            state.select(Some(0));
        }

        let mut categories_state = TableState::default();
        categories_state.select(Some(0));

        let filtered_entries = entries.clone();

        Self {
            entries,
            filtered_entries,
            categories,
            state,
            categories_state,
            total_count,
            current_page: Page::Register,
            category_filter: None,
        }
    }

    /// Rotate the category filter: All -> first category -> ... -> All
    pub fn cycle_filter(&mut self) {
        self.category_filter = match self.category_filter {
            None if self.categories.is_empty() => None,
            None => Some(0),
            Some(i) if i + 1 >= self.categories.len() => None,
            Some(i) => Some(i + 1),
        };
        self.apply_filter();
    }

    pub fn clear_filter(&mut self) {
        self.category_filter = None;
        self.apply_filter();
    }

    pub fn active_filter_name(&self) -> Option<&str> {
        self.category_filter
            .and_then(|i| self.categories.get(i))
            .map(|s| s.as_str())
    }

    fn apply_filter(&mut self) {
        self.filtered_entries = match self.active_filter_name() {
            None => self.entries.clone(),
            Some(category) => self
                .entries
                .iter()
                .filter(|e| e.category == category)
                .cloned()
                .collect(),
        };

        // Reset selection to first item
        if !self.filtered_entries.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    /// Per-category (name, count, total), largest total first
    pub fn category_summary(&self) -> Vec<(String, usize, f64)> {
        let mut summary: HashMap<String, (usize, f64)> = HashMap::new();

        for entry in &self.entries {
            let slot = summary.entry(entry.category.clone()).or_insert((0, 0.0));
            slot.0 += 1;
            slot.1 += entry.amount;
        }

        let mut result: Vec<_> = summary
            .into_iter()
            .map(|(category, (count, total))| (category, count, total))
            .collect();

        result.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        result
    }

    pub fn total_spent(&self) -> f64 {
        self.entries.iter().map(|e| e.amount).sum()
    }

    pub fn next(&mut self) {
        let len = self.filtered_entries.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.filtered_entries.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.filtered_entries.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                let next = i + 20;
                if next >= len {
                    len - 1
                } else {
                    next
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = match self.state.selected() {
            Some(i) => {
                if i < 20 {
                    0
                } else {
                    i - 20
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab | KeyCode::BackTab => {
                    app.current_page = app.current_page.next();
                }
                KeyCode::Char('f') if app.current_page == Page::Register => app.cycle_filter(),
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::Register;
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home | KeyCode::Char('g') => app.state.select(Some(0)),
                KeyCode::End | KeyCode::Char('G') => {
                    if !app.filtered_entries.is_empty() {
                        app.state.select(Some(app.filtered_entries.len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Register => render_register(f, chunks[1], app),
        Page::Categories => render_categories(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Register, Page::Categories];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Entries: {}", app.total_count),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Spent: {:.2}", app.total_spent()),
        Style::default().fg(Color::Red),
    ));

    let header_text = vec![Line::from(tab_spans)];

    let header = Paragraph::new(header_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Personal Finance Dashboard "),
    );

    f.render_widget(header, area);
}

fn render_register(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Date", "Amount", "Category", "Note"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.filtered_entries.iter().map(|entry| {
        let cells = vec![
            Cell::from(entry.date().format("%Y-%m-%d").to_string()),
            Cell::from(format!("{:.2}", entry.amount)).style(Style::default().fg(Color::Red)),
            Cell::from(truncate(&entry.category, 20)),
            Cell::from(truncate(&entry.note, 38)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(22),
            Constraint::Length(40),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Spending "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_categories(f: &mut Frame, area: Rect, app: &mut App) {
    let summary = app.category_summary();

    let header_cells = ["Category", "Entries", "Total", "Avg"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = summary.iter().map(|(category, count, total)| {
        let avg = total / *count as f64;

        let cells = vec![
            Cell::from(category.clone()),
            Cell::from(format!("{}", count)),
            Cell::from(format!("{:.2}", total)).style(Style::default().fg(Color::Red)),
            Cell::from(format!("{:.2}", avg)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(24),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Spending by Category "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.categories_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.filtered_entries.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(filter) = app.active_filter_name() {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", filter),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("f", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Filter | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Fast | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_text = vec![Line::from(status_spans)];

    let status_bar = Paragraph::new(status_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn entry(amount: f64, category: &str, timestamp: &str) -> SpendingEntry {
        SpendingEntry::new(
            amount,
            category,
            "",
            DateTime::parse_from_rfc3339(timestamp)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn sample_app() -> App {
        let entries = vec![
            entry(10.0, "Groceries", "2024-01-01T08:00:00Z"),
            entry(20.0, "Shopping", "2024-01-02T08:00:00Z"),
            entry(30.0, "Groceries", "2024-01-03T08:00:00Z"),
        ];
        let categories = vec!["Groceries".to_string(), "Shopping".to_string()];
        App::new(entries, categories, 3)
    }

    #[test]
    fn test_filter_cycling() {
        let mut app = sample_app();
        assert_eq!(app.active_filter_name(), None);
        assert_eq!(app.filtered_entries.len(), 3);

        app.cycle_filter();
        assert_eq!(app.active_filter_name(), Some("Groceries"));
        assert_eq!(app.filtered_entries.len(), 2);

        app.cycle_filter();
        assert_eq!(app.active_filter_name(), Some("Shopping"));
        assert_eq!(app.filtered_entries.len(), 1);

        // Wraps back around to All
        app.cycle_filter();
        assert_eq!(app.active_filter_name(), None);
        assert_eq!(app.filtered_entries.len(), 3);
    }

    #[test]
    fn test_category_summary_sorted_by_total() {
        let app = sample_app();
        let summary = app.category_summary();

        assert_eq!(summary[0].0, "Groceries");
        assert_eq!(summary[0].1, 2);
        assert!((summary[0].2 - 40.0).abs() < f64::EPSILON);
        assert_eq!(summary[1].0, "Shopping");
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = sample_app();
        assert_eq!(app.state.selected(), Some(0));

        app.previous();
        assert_eq!(app.state.selected(), Some(2));

        app.next();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_total_spent() {
        let app = sample_app();
        assert!((app.total_spent() - 60.0).abs() < f64::EPSILON);
    }
}
