use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::collections::BTreeSet;
use std::io::{self, Stdout};
use std::path::Path;

use tally_core::{
    apply_filter, category_breakdown, detail_rows, format_currency, BreakdownSlice, Category,
    ClassifiedTransaction, DatasetCache, FilterOptions, Metrics, PeriodKey, StoreError,
};

const PALETTE: [Color; 12] = [
    Color::LightRed,
    Color::LightBlue,
    Color::LightGreen,
    Color::LightMagenta,
    Color::LightYellow,
    Color::LightCyan,
    Color::Red,
    Color::Blue,
    Color::Green,
    Color::Magenta,
    Color::Yellow,
    Color::Cyan,
];

pub const EMPTY_BREAKDOWN: &str = "Sem despesas para exibir neste período.";

pub fn halt_message(path: &Path) -> String {
    format!(
        "Arquivo '{}' não encontrado. Rode 'tally ingest' primeiro!",
        path.display()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Periods,
    Categories,
    Table,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Periods => Focus::Categories,
            Focus::Categories => Focus::Table,
            Focus::Table => Focus::Periods,
        }
    }
}

/// Everything one frame shows, derived from the current selection
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub period: Option<PeriodKey>,
    pub metrics: Metrics,
    pub slices: Vec<BreakdownSlice>,
    pub detail: Vec<ClassifiedTransaction>,
}

pub enum Loaded {
    /// Nothing to show; the viewer stops here
    Halted(String),
    Ready(Dashboard),
}

pub struct Dashboard {
    cache: DatasetCache,
    currency: String,
    options: FilterOptions,
    period_idx: usize,
    selected: BTreeSet<Category>,
    category_cursor: usize,
    focus: Focus,
    table_state: TableState,
}

impl Dashboard {
    pub fn open(mut cache: DatasetCache, currency: &str) -> Result<Loaded> {
        let options = match cache.get() {
            Ok(rows) => FilterOptions::derive(rows),
            Err(StoreError::Missing(p)) => return Ok(Loaded::Halted(halt_message(&p))),
            Err(e) => return Err(e.into()),
        };
        let selected = options.all_categories();

        Ok(Loaded::Ready(Self {
            cache,
            currency: currency.to_string(),
            options,
            period_idx: 0,
            selected,
            category_cursor: 0,
            focus: Focus::Periods,
            table_state: TableState::default(),
        }))
    }

    pub fn period(&self) -> Option<PeriodKey> {
        self.options.periods.get(self.period_idx).copied()
    }

    /// Recomputes the frame. A file rewritten since the last frame also
    /// refreshes the period and category choices.
    pub fn snapshot(&mut self) -> Result<Snapshot, StoreError> {
        let loads = self.cache.loads();
        self.cache.get()?;
        if self.cache.loads() != loads {
            self.reload()?;
        }

        let period = self.period();
        let rows = self.cache.get()?;
        let filtered = match period {
            Some(p) => apply_filter(rows, p, &self.selected),
            None => Vec::new(),
        };

        Ok(Snapshot {
            period,
            metrics: Metrics::compute(&filtered),
            slices: category_breakdown(&filtered),
            detail: detail_rows(&filtered).into_iter().cloned().collect(),
        })
    }

    /// Pick up a rewritten file. Selection resets if the choices changed.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let fresh = FilterOptions::derive(self.cache.get()?);
        if fresh != self.options {
            let keep = self.period();
            self.period_idx = keep
                .and_then(|p| fresh.periods.iter().position(|q| *q == p))
                .unwrap_or(0);
            self.selected = fresh.all_categories();
            self.category_cursor = 0;
            self.options = fresh;
            self.table_state = TableState::default();
        }
        Ok(())
    }

    /// Returns false when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool, StoreError> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Char('a') => self.selected = self.options.all_categories(),
            KeyCode::Char('r') => {
                self.cache.invalidate();
                self.reload()?;
            }
            KeyCode::Char(' ') if self.focus == Focus::Categories => {
                if let Some(c) = self.options.categories.get(self.category_cursor) {
                    if !self.selected.remove(c) {
                        self.selected.insert(*c);
                    }
                }
            }
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            _ => {}
        }
        Ok(true)
    }

    fn move_cursor(&mut self, delta: isize) {
        match self.focus {
            Focus::Periods => {
                self.period_idx = step(self.period_idx, delta, self.options.periods.len());
                self.table_state = TableState::default();
            }
            Focus::Categories => {
                self.category_cursor =
                    step(self.category_cursor, delta, self.options.categories.len());
            }
            Focus::Table => {
                let i = self.table_state.selected().unwrap_or(0);
                self.table_state.select(Some(if delta < 0 {
                    i.saturating_sub(1)
                } else {
                    i + 1
                }));
            }
        }
    }
}

fn step(i: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    i.saturating_add_signed(delta).min(len - 1)
}

/// Widths of the proportional bar segments; they always fill `width`.
pub fn segment_widths(slices: &[BreakdownSlice], width: u16) -> Vec<u16> {
    if slices.is_empty() {
        return Vec::new();
    }
    let mut widths: Vec<u16> = slices
        .iter()
        .map(|s| (s.share * f64::from(width)).floor() as u16)
        .collect();
    let used: u16 = widths.iter().sum();
    widths[0] += width.saturating_sub(used);
    widths
}

pub fn run_dashboard(path: &Path, currency: &str) -> Result<()> {
    let loaded = Dashboard::open(DatasetCache::new(path), currency)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = match loaded {
        Loaded::Halted(msg) => halt_loop(&mut terminal, &msg),
        Loaded::Ready(mut dashboard) => dashboard_loop(&mut terminal, &mut dashboard),
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

fn halt_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, msg: &str) -> Result<()> {
    loop {
        terminal.draw(|f| {
            let area = f.area();
            draw_halt(f, area, msg)
        })?;
        if wait_key()?.is_some() {
            return Ok(());
        }
    }
}

fn dashboard_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    dashboard: &mut Dashboard,
) -> Result<()> {
    loop {
        match dashboard.snapshot() {
            Ok(snap) => {
                terminal.draw(|f| draw_dashboard(f, dashboard, &snap))?;
            }
            Err(e) => {
                let msg = match e {
                    StoreError::Missing(p) => halt_message(&p),
                    other => other.to_string(),
                };
                return halt_loop(terminal, &msg);
            }
        }

        if let Some(code) = wait_key()? {
            match dashboard.handle_key(code) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => {
                    let msg = match e {
                        StoreError::Missing(p) => halt_message(&p),
                        other => other.to_string(),
                    };
                    return halt_loop(terminal, &msg);
                }
            }
        }
    }
}

fn wait_key() -> Result<Option<KeyCode>> {
    if event::poll(std::time::Duration::from_millis(50))? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(Some(key.code));
            }
        }
    }
    Ok(None)
}

fn draw_halt(f: &mut Frame, area: Rect, msg: &str) {
    let p = Paragraph::new(Text::from(vec![
        Line::from(Span::styled(
            msg.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        Line::from(Span::styled(
            "pressione qualquer tecla para sair",
            Style::default().fg(Color::Gray),
        )),
    ]))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Dashboard Financeiro"));
    f.render_widget(p, area);
}

fn focused_block(title: &str, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title.to_string())
}

fn draw_dashboard(f: &mut Frame, d: &mut Dashboard, snap: &Snapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(1)])
        .split(f.area());

    let title = Paragraph::new(Line::from(Span::styled(
        "Dashboard de Finanças Pessoais",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, rows[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(36), Constraint::Min(40)])
        .split(rows[1]);

    draw_sidebar(f, d, body[0]);

    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(6)])
        .split(body[1]);

    draw_metrics(f, &snap.metrics, &d.currency, main[0]);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(main[1]);

    draw_breakdown(f, &snap.slices, &d.currency, content[0]);
    draw_detail(f, d, snap, content[1]);

    let help = Paragraph::new(Line::from(Span::styled(
        "Tab=foco  ↑/↓=mover  Espaço=marcar categoria  a=todas  r=recarregar  q=sair",
        Style::default().fg(Color::Gray),
    )));
    f.render_widget(help, rows[2]);
}

fn draw_sidebar(f: &mut Frame, d: &Dashboard, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let periods: Vec<ListItem> = d
        .options
        .periods
        .iter()
        .map(|p| ListItem::new(p.to_string()))
        .collect();
    let list = List::new(periods)
        .block(focused_block("Mês", d.focus == Focus::Periods))
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(d.period_idx));
    f.render_stateful_widget(list, parts[0], &mut state);

    let categories: Vec<ListItem> = d
        .options
        .categories
        .iter()
        .map(|c| {
            let mark = if d.selected.contains(c) { "[x]" } else { "[ ]" };
            ListItem::new(format!("{mark} {}", c.label()))
        })
        .collect();
    let list = List::new(categories)
        .block(focused_block("Categorias", d.focus == Focus::Categories))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if d.focus == Focus::Categories {
        state.select(Some(d.category_cursor));
    }
    f.render_stateful_widget(list, parts[1], &mut state);
}

fn draw_metrics(f: &mut Frame, m: &Metrics, currency: &str, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    let net_color = if m.net < 0.0 { Color::Red } else { Color::Green };
    let cards = [
        ("Receitas", m.inflow, Color::Green),
        ("Despesas", m.outflow, Color::Red),
        ("Saldo do Mês", m.net, net_color),
    ];
    for (i, (label, value, color)) in cards.into_iter().enumerate() {
        let p = Paragraph::new(Line::from(Span::styled(
            format_currency(value, currency),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(label));
        f.render_widget(p, cols[i]);
    }
}

fn draw_breakdown(f: &mut Frame, slices: &[BreakdownSlice], currency: &str, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Distribuição de Gastos");

    if slices.is_empty() {
        let p = Paragraph::new(EMPTY_BREAKDOWN)
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: true })
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let inner_width = area.width.saturating_sub(2);
    let widths = segment_widths(slices, inner_width);

    let bar: Vec<Span> = slices
        .iter()
        .zip(&widths)
        .enumerate()
        .map(|(i, (_, w))| {
            Span::styled(
                "█".repeat(usize::from(*w)),
                Style::default().fg(PALETTE[i % PALETTE.len()]),
            )
        })
        .collect();

    let mut lines = vec![Line::from(bar), Line::raw("")];
    for (i, s) in slices.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled("■ ", Style::default().fg(PALETTE[i % PALETTE.len()])),
            Span::raw(format!("{:<30}", s.category.label())),
            Span::styled(
                format!("{:>5.1}%  ", s.share * 100.0),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format_currency(s.total, currency)),
        ]));
    }

    f.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
}

fn draw_detail(f: &mut Frame, d: &mut Dashboard, snap: &Snapshot, area: Rect) {
    let header = Row::new(["Data", "Descrição", "Categoria", "Valor"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = snap
        .detail
        .iter()
        .map(|r| {
            let color = if r.amount() < 0.0 { Color::Red } else { Color::Green };
            Row::new(vec![
                Cell::from(r.date().format("%Y-%m-%d").to_string()),
                Cell::from(r.description().to_string()),
                Cell::from(r.category.label()),
                Cell::from(Span::styled(
                    format_currency(r.amount(), &d.currency),
                    Style::default().fg(color),
                )),
            ])
        })
        .collect();

    if let Some(i) = d.table_state.selected() {
        if i >= rows.len() {
            d.table_state.select(rows.len().checked_sub(1));
        }
    }

    let title = match snap.period {
        Some(p) => format!("Extrato Detalhado ({p}, {} lançamentos)", snap.detail.len()),
        None => "Extrato Detalhado".to_string(),
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Min(20),
            Constraint::Length(18),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(focused_block(&title, d.focus == Focus::Table))
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    f.render_stateful_widget(table, area, &mut d.table_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use tally_core::{write_classified, Transaction};

    fn temp_csv(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tally-dash-{}-{}.csv", std::process::id(), name))
    }

    fn rows() -> Vec<ClassifiedTransaction> {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        vec![
            ClassifiedTransaction::new(Transaction::new(d(5, 2), 100.0, "SALARIO", "1"), Category::Income),
            ClassifiedTransaction::new(Transaction::new(d(5, 9), -40.0, "IFD*X", "2"), Category::Food),
            ClassifiedTransaction::new(Transaction::new(d(5, 3), -10.0, "UBER", "3"), Category::Transport),
            ClassifiedTransaction::new(Transaction::new(d(4, 1), -99.0, "ALUGUEL", "4"), Category::Housing),
        ]
    }

    fn ready(path: &Path) -> Dashboard {
        match Dashboard::open(DatasetCache::new(path), "R$").unwrap() {
            Loaded::Ready(d) => d,
            Loaded::Halted(msg) => panic!("unexpected halt: {msg}"),
        }
    }

    #[test]
    fn test_missing_file_halts() {
        let path = Path::new("/nonexistent/tally/extrato_classificado.csv");
        match Dashboard::open(DatasetCache::new(path), "R$").unwrap() {
            Loaded::Halted(msg) => {
                assert!(msg.contains("extrato_classificado.csv"));
                assert!(msg.contains("tally ingest"));
            }
            Loaded::Ready(_) => panic!("expected halt"),
        }
    }

    #[test]
    fn test_defaults_latest_period_all_categories() {
        let path = temp_csv("defaults");
        write_classified(&path, &rows()).unwrap();
        let mut d = ready(&path);

        assert_eq!(d.period().map(|p| p.to_string()).as_deref(), Some("2024-05"));
        assert_eq!(d.selected.len(), 4);

        let snap = d.snapshot().unwrap();
        assert_eq!(snap.metrics.inflow, 100.0);
        assert_eq!(snap.metrics.outflow, -50.0);
        assert_eq!(snap.metrics.net, 50.0);
        assert_eq!(snap.slices[0].category, Category::Food);
        let dates: Vec<_> = snap.detail.iter().map(|r| r.date().to_string()).collect();
        assert_eq!(dates, vec!["2024-05-02", "2024-05-03", "2024-05-09"]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_keys_change_selection() {
        let path = temp_csv("keys");
        write_classified(&path, &rows()).unwrap();
        let mut d = ready(&path);

        // period list: 2024-05, 2024-04
        assert!(d.handle_key(KeyCode::Down).unwrap());
        assert_eq!(d.period().map(|p| p.to_string()).as_deref(), Some("2024-04"));
        let snap = d.snapshot().unwrap();
        assert_eq!(snap.metrics.outflow, -99.0);
        d.handle_key(KeyCode::Up).unwrap();

        // untick the first category (Receitas)
        d.handle_key(KeyCode::Tab).unwrap();
        d.handle_key(KeyCode::Char(' ')).unwrap();
        assert!(!d.selected.contains(&Category::Income));
        let snap = d.snapshot().unwrap();
        assert_eq!(snap.metrics.inflow, 0.0);
        assert_eq!(snap.detail.len(), 2);

        d.handle_key(KeyCode::Char('a')).unwrap();
        assert!(d.selected.contains(&Category::Income));

        assert!(!d.handle_key(KeyCode::Char('q')).unwrap());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rewritten_file_refreshes_choices() {
        let path = temp_csv("rewritten");
        write_classified(&path, &rows()).unwrap();
        let mut d = ready(&path);
        d.snapshot().unwrap();

        let mut more = rows();
        more.push(ClassifiedTransaction::new(
            Transaction::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), -25.0, "FARMACIA", "5"),
            Category::Health,
        ));
        write_classified(&path, &more).unwrap();

        let snap = d.snapshot().unwrap();
        let periods: Vec<_> = d.options.periods.iter().map(|p| p.to_string()).collect();
        assert_eq!(periods, vec!["2024-06", "2024-05", "2024-04"]);
        assert!(d.selected.contains(&Category::Health));
        // the period being viewed stays put
        assert_eq!(snap.period.map(|p| p.to_string()).as_deref(), Some("2024-05"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_file_removed_mid_session() {
        let path = temp_csv("removed");
        write_classified(&path, &rows()).unwrap();
        let mut d = ready(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(d.snapshot(), Err(StoreError::Missing(_))));
    }

    #[test]
    fn test_segment_widths_fill_bar() {
        let slices = vec![
            BreakdownSlice { category: Category::Food, total: 2.0, share: 2.0 / 3.0 },
            BreakdownSlice { category: Category::Transport, total: 1.0, share: 1.0 / 3.0 },
        ];
        let w = segment_widths(&slices, 10);
        assert_eq!(w.iter().sum::<u16>(), 10);
        assert!(w[0] >= w[1]);
        assert!(segment_widths(&[], 10).is_empty());
    }
}
