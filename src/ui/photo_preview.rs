use image::DynamicImage;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};

enum PreviewState {
    Empty,
    Loading(i64),
    Ready { photo_id: i64, protocol: StatefulProtocol },
    Failed { photo_id: i64, message: String },
}

/// Inline image of the focused photo.
pub struct PhotoPreview {
    /// Image picker for protocol detection
    picker: Option<Picker>,
    state: PreviewState,
}

impl PhotoPreview {
    /// No picker; previews are never requested.
    pub fn disabled() -> Self {
        Self::with_picker(None)
    }

    /// Ask the terminal which graphics protocol it speaks. Must run after
    /// the terminal is in raw mode.
    pub fn detect() -> Self {
        let picker = match Picker::from_query_stdio() {
            Ok(picker) => Some(picker),
            Err(e) => {
                tracing::warn!(error = %e, "Terminal image query failed, previews disabled");
                None
            }
        };
        Self::with_picker(picker)
    }

    pub fn with_picker(picker: Option<Picker>) -> Self {
        Self {
            picker,
            state: PreviewState::Empty,
        }
    }

    pub fn is_available(&self) -> bool {
        self.picker.is_some()
    }

    /// The photo shown, being fetched, or that failed to load.
    pub fn photo_id(&self) -> Option<i64> {
        match self.state {
            PreviewState::Empty => None,
            PreviewState::Loading(id)
            | PreviewState::Ready { photo_id: id, .. }
            | PreviewState::Failed { photo_id: id, .. } => Some(id),
        }
    }

    pub fn is_shown(&self) -> bool {
        !matches!(self.state, PreviewState::Empty)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PreviewState::Ready { .. })
    }

    pub fn start(&mut self, photo_id: i64) {
        self.state = PreviewState::Loading(photo_id);
    }

    pub fn clear(&mut self) {
        self.state = PreviewState::Empty;
    }

    /// Show a decoded image. Ignored unless `photo_id` is the one being
    /// fetched.
    pub fn finish(&mut self, photo_id: i64, image: DynamicImage) -> bool {
        if !matches!(self.state, PreviewState::Loading(id) if id == photo_id) {
            return false;
        }
        let Some(ref mut picker) = self.picker else {
            return false;
        };
        let protocol = picker.new_resize_protocol(image);
        self.state = PreviewState::Ready { photo_id, protocol };
        true
    }

    pub fn fail(&mut self, message: String) {
        if let PreviewState::Loading(photo_id) = self.state {
            self.state = PreviewState::Failed { photo_id, message };
        }
    }
}

pub fn render(frame: &mut Frame, preview: &mut PhotoPreview, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Preview ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Skip if area too small
    if inner.width < 2 || inner.height < 2 {
        return;
    }

    let note = |text: String| {
        Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
    };

    match preview.state {
        PreviewState::Empty => {}
        PreviewState::Loading(_) => frame.render_widget(note("Loading...".to_string()), inner),
        PreviewState::Failed { ref message, .. } => frame.render_widget(note(message.clone()), inner),
        PreviewState::Ready { ref mut protocol, .. } => {
            let image = StatefulImage::new(None).resize(Resize::Fit(None));
            frame.render_stateful_widget(image, inner, protocol);
        }
    }
}
