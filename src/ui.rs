use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
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
use std::io;

use statement_lens::{CategoryTotal, StatementReport, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Transactions,
    Categories,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Transactions => Page::Categories,
            Page::Categories => Page::Transactions,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Transactions => "Transactions",
            Page::Categories => "Categories",
        }
    }
}

pub struct App {
    pub report: StatementReport,
    /// Indices into `report.transactions` that pass the active filter
    pub visible: Vec<usize>,
    pub state: TableState,
    pub categories_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub category_filter: Option<String>,
}

impl App {
    pub fn new(report: StatementReport) -> Self {
        let visible: Vec<usize> = (0..report.transactions.len()).collect();

        let mut state = TableState::default();
        if !visible.is_empty() {
            state.select(Some(0));
        }

        let mut categories_state = TableState::default();
        if !report.summary.category_summary.is_empty() {
            categories_state.select(Some(0));
        }

        Self {
            report,
            visible,
            state,
            categories_state,
            current_page: Page::Transactions,
            show_detail: false,
            category_filter: None,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn visible_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.visible.iter().map(|&i| &self.report.transactions[i])
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        self.state
            .selected()
            .and_then(|i| self.visible.get(i))
            .map(|&idx| &self.report.transactions[idx])
    }

    pub fn selected_category(&self) -> Option<&CategoryTotal> {
        self.categories_state
            .selected()
            .and_then(|i| self.report.summary.category_summary.get(i))
    }

    pub fn apply_filter(&mut self, category: Option<String>) {
        self.visible = self
            .report
            .transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| category.as_deref().map_or(true, |c| tx.category == c))
            .map(|(i, _)| i)
            .collect();
        self.category_filter = category;

        // Reset selection to first item
        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(None);
    }

    /// Filter transactions by the category highlighted on the Categories page
    pub fn filter_selected_category(&mut self) {
        if let Some(name) = self.selected_category().map(|c| c.category.clone()) {
            self.apply_filter(Some(name));
            self.current_page = Page::Transactions;
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.show_detail = false;
    }

    fn active_len(&self) -> usize {
        match self.current_page {
            Page::Transactions => self.visible.len(),
            Page::Categories => self.report.summary.category_summary.len(),
        }
    }

    fn active_state(&mut self) -> &mut TableState {
        match self.current_page {
            Page::Transactions => &mut self.state,
            Page::Categories => &mut self.categories_state,
        }
    }

    fn select_with(&mut self, step: impl Fn(usize, usize) -> usize) {
        let len = self.active_len();
        if len == 0 {
            return;
        }
        let state = self.active_state();
        let i = state.selected().map(|i| step(i, len)).unwrap_or(0);
        state.select(Some(i));
    }

    pub fn next(&mut self) {
        self.select_with(|i, len| if i >= len - 1 { 0 } else { i + 1 });
    }

    pub fn previous(&mut self) {
        self.select_with(|i, len| if i == 0 { len - 1 } else { i - 1 });
    }

    pub fn page_down(&mut self) {
        self.select_with(|i, len| (i + 20).min(len - 1));
    }

    pub fn page_up(&mut self) {
        self.select_with(|i, _| i.saturating_sub(20));
    }

    pub fn first(&mut self) {
        self.select_with(|_, _| 0);
    }

    pub fn last(&mut self) {
        self.select_with(|_, len| len - 1);
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Enter => match app.current_page {
                    Page::Transactions => app.toggle_detail(),
                    Page::Categories => app.filter_selected_category(),
                },
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::Transactions;
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
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

    if app.show_detail && app.current_page == Page::Transactions {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_transactions(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Transactions => render_transactions(f, chunks[1], app),
            Page::Categories => render_categories(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let summary = &app.report.summary;

    let mut tab_spans = vec![];
    for (i, page) in [Page::Transactions, Page::Categories].iter().enumerate() {
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
        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.report.bank.name().to_string(),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Spend {:.2}", summary.total_spend),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("{} txs", summary.total_transactions),
        Style::default().fg(Color::White),
    ));
    if let Some(top) = &summary.top_category {
        tab_spans.push(Span::raw("  |  Top: "));
        tab_spans.push(Span::styled(top.clone(), Style::default().fg(Color::Green)));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn header_row<'a>(titles: &'a [&'a str]) -> Row<'a> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_transactions(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .visible_transactions()
        .map(|tx| {
            let color = if tx.is_debit() { Color::Red } else { Color::Green };
            Row::new(vec![
                Cell::from(tx.date.clone()),
                Cell::from(truncate(&tx.description, 40)),
                Cell::from(format!("{:.2}", tx.amount)).style(Style::default().fg(color)),
                Cell::from(truncate(&tx.category, 18)),
            ])
            .height(1)
        })
        .collect();

    let title = match &app.category_filter {
        Some(c) => format!(" Transactions - {} ", c),
        None => " Transactions ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(42),
            Constraint::Length(12),
            Constraint::Length(20),
        ],
    )
    .header(header_row(&["Transaction Date", "Description/Narration", "Amount", "Category"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_categories(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .report
        .summary
        .category_summary
        .iter()
        .map(|c| {
            Row::new(vec![
                Cell::from(c.category.clone()),
                Cell::from(c.count.to_string()),
                Cell::from(format!("{:.2}", c.total)).style(Style::default().fg(Color::Red)),
                Cell::from(format!("{:>5.1}% {}", c.share, share_bar(c.share, 20))),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Min(28),
        ],
    )
    .header(header_row(&["Category", "Transactions", "Amount", "Share"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Spending by Category (Enter to filter) "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.categories_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (selected, total) = match app.current_page {
        Page::Transactions => (app.state.selected(), app.visible.len()),
        Page::Categories => (
            app.categories_state.selected(),
            app.report.summary.category_summary.len(),
        ),
    };

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected.map(|i| i + 1).unwrap_or(0), total),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(category) = &app.category_filter {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", category),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    for (key, label) in [("Enter", " Select | "), ("Tab", " Page | "), ("↑/↓", " Nav | ")] {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Transaction Details ");

    let Some(tx) = app.selected_transaction() else {
        f.render_widget(Paragraph::new("No transaction selected").block(block), area);
        return;
    };

    let label = |text: &'static str| {
        Span::styled(text, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    };
    let amount_color = if tx.is_debit() { Color::Red } else { Color::Green };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![label("  Date: "), Span::raw(tx.date.clone())]),
        Line::from(""),
        Line::from(vec![
            label("  Amount: "),
            Span::styled(format!("{:.2}", tx.amount), Style::default().fg(amount_color)),
            Span::raw(format!(" {}", tx.direction.as_str())),
        ]),
        Line::from(""),
        Line::from(vec![label("  Category: "), Span::raw(tx.category.clone())]),
        Line::from(vec![
            label("  Rule: "),
            Span::raw(tx.rule_id.clone().unwrap_or_else(|| "fallback".to_string())),
            Span::raw(format!(" ({:.0}%)", tx.confidence * 100.0)),
        ]),
    ];

    if let Some(balance) = tx.balance {
        content.push(Line::from(""));
        content.push(Line::from(vec![label("  Balance: "), Span::raw(format!("{:.2}", balance))]));
    }

    content.extend([
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(vec![Span::styled(
            "  PROVENANCE",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(vec![
            label("  Source File: "),
            Span::styled(app.report.source_file.clone(), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            label("  Page/Line: "),
            Span::styled(
                format!("{} / {} ({})", tx.page, tx.line_number, tx.mode.name()),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from("  ─────────────────────────────────────"),
        Line::from(vec![Span::styled(
            "  DESCRIPTION",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
    ]);
    for line in wrap_text(&tx.description, 35) {
        content.push(Line::from(Span::styled(
            format!("  {}", line),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn share_bar(share: f64, width: usize) -> String {
    let filled = ((share.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    "█".repeat(filled)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
