//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::bits::Word;
use crate::cpu::registers::register_name;
use super::app::{DebuggerApp, MEMORY_ROW_WORDS};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(5),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw disassembly from PC onwards.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}${:04X}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw registers, flags and counters.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let state = app.machine.state();

    let register_row = |range: std::ops::Range<usize>| {
        let spans: Vec<Span> = range
            .flat_map(|i| {
                let style = if i == 7 {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default().fg(Color::White)
                };
                [
                    Span::raw(format!("{}: ", register_name(i))),
                    Span::styled(format!("${:04X}", state.registers[i]), style),
                    Span::raw("  "),
                ]
            })
            .collect();
        Line::from(spans)
    };

    let flags = state.flags;
    let content = vec![
        register_row(0..4),
        register_row(4..8),
        Line::from(vec![
            Span::raw("Flags: "),
            Span::styled("S ", flag_style(flags.s)),
            Span::styled("Z ", flag_style(flags.z)),
            Span::styled("OV ", flag_style(flags.ov)),
            Span::styled("C", flag_style(flags.c)),
            Span::raw("   SDBD: "),
            Span::styled(if state.sdbd { "on" } else { "off" }, flag_style(state.sdbd)),
            Span::raw("   Int: "),
            Span::styled(
                if state.interrupts_enabled { "enabled" } else { "disabled" },
                flag_style(state.interrupts_enabled),
            ),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", state.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   Instructions: "),
            Span::styled(
                format!("{}", app.machine.instructions_executed()),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("   State: "),
            Span::styled(
                if state.halted { "Halted" } else { "Running" },
                if state.halted {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::Green)
                },
            ),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory view, eight words per row.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let pc = app.machine.cpu().pc();

    let items: Vec<ListItem> = (0..visible_rows)
        .map(|row| {
            let base = app
                .mem_base
                .wrapping_add((row as Word).wrapping_mul(MEMORY_ROW_WORDS));
            let words = app
                .machine
                .memory()
                .read_range(base, MEMORY_ROW_WORDS as usize)
                .unwrap_or_default();

            let mut spans = vec![Span::styled(
                format!("${:04X}: ", base),
                Style::default().fg(Color::Magenta),
            )];
            for (offset, word) in words.iter().enumerate() {
                let addr = base.wrapping_add(offset as Word);
                let style = if addr == pc {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if *word != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:04X} ", word), style));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint  x: Reset"),
        Line::from("↑↓ PgUp PgDn: Scroll memory  g: Memory at PC  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

/// Green when set, grey when clear.
fn flag_style(set: bool) -> Style {
    if set {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}
