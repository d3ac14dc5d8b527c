//! Terminal stand-in for the OAuth popup: prints the authorization URL and
//! treats Enter as the user closing the window.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gorillas::{OpenedPopup, PopupOpener, PopupWindow, WindowMessage};
use tokio::sync::mpsc;
use tracing::debug;

pub struct TerminalPopupOpener;

struct TerminalWindow {
    closed: Arc<AtomicBool>,
    // Held so the message stream stays open while the window is.
    _messages: mpsc::UnboundedSender<WindowMessage>,
}

impl PopupWindow for TerminalWindow {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl PopupOpener for TerminalPopupOpener {
    fn open(&self, url: &str) -> gorillas::Result<OpenedPopup> {
        eprintln!("Open this URL in a browser to link Discord:\n\n  {url}\n");
        eprintln!("Press Enter once you have authorized the app.");

        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        std::thread::spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
            debug!("popup dismissed from terminal");
            flag.store(true, Ordering::SeqCst);
        });

        let (tx, rx) = mpsc::unbounded_channel();
        Ok(OpenedPopup {
            window: Box::new(TerminalWindow {
                closed,
                _messages: tx,
            }),
            messages: rx,
        })
    }
}
