//! Console notifier - prints task lifecycle events as they happen

use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use relay_foundation::EventListener;
use relay_task::{StatusFormatter, TaskEvent};
use std::io;

pub struct ConsoleNotifier {
    formatter: StatusFormatter,
}

impl ConsoleNotifier {
    pub fn new(formatter: StatusFormatter) -> Self {
        Self { formatter }
    }

    /// Color and text for an event
    fn render(&self, event: &TaskEvent) -> (Color, String) {
        let task = event.record();
        match event {
            TaskEvent::Start(_) => {
                let pid = task
                    .pid
                    .map(|p| format!(" (pid {})", p))
                    .unwrap_or_default();
                (
                    Color::Cyan,
                    format!("▶ [{}] started: {}{}", task.id, task.description, pid),
                )
            }
            TaskEvent::Cancel(_) => (
                Color::Yellow,
                format!("⊘ [{}] cancelled: {}", task.id, task.description),
            ),
            TaskEvent::Done(_) | TaskEvent::Error(_) => {
                let color = if matches!(event, TaskEvent::Done(_)) {
                    Color::Green
                } else {
                    Color::Red
                };
                let text = self
                    .formatter
                    .format_notification(event)
                    .unwrap_or_else(|| format!("[{}] {}", task.id, task.status));
                (color, text)
            }
        }
    }
}

impl EventListener<TaskEvent> for ConsoleNotifier {
    fn name(&self) -> &str {
        "console-notifier"
    }

    fn on_event(&self, event: &TaskEvent) {
        let (color, text) = self.render(event);
        // Nowhere to report a failed write to the console
        let _ = execute!(
            io::stdout(),
            SetForegroundColor(color),
            Print(format!("\n{}\n", text)),
            ResetColor
        );
    }
}
