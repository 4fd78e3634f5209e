//! Interactive control: quit requests from stdin and Ctrl-C.
//!
//! Both inputs are funnelled into one crossbeam channel so the main loop
//! has a single place to wait on.
use crossbeam_channel::Sender;
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// A request from the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// A quit line was read from stdin.
    Quit,
    /// Ctrl-C (or the platform's console interrupt).
    Interrupt,
}

/// Whether a line read from stdin asks to quit: exactly `q` or `Q`. A
/// trailing `\r` from a Windows console is ignored.
pub fn is_quit_command(line: &str) -> bool {
    matches!(line.strip_suffix('\r').unwrap_or(line), "q" | "Q")
}

/// Read `input` line by line on a background thread, sending
/// [`Control::Quit`] on the first quit line.
///
/// End of input is not a quit request: with stdin redirected from
/// `/dev/null` the process keeps watching until Ctrl-C.
pub fn spawn_input_reader<R>(input: R, tx: Sender<Control>) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("drivesentry-input".to_owned())
        .spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) if is_quit_command(&line) => {
                        debug!("Quit command read from input");
                        let _ = tx.send(Control::Quit);
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Reading input failed, quit with Ctrl-C instead: {}", e);
                        return;
                    }
                }
            }
            debug!("Input closed; still watching until Ctrl-C");
        })
}

/// Route Ctrl-C into the control channel. Can only be installed once per
/// process.
pub fn install_interrupt_handler(tx: Sender<Control>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        let _ = tx.send(Control::Interrupt);
    })
}
