use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::capture::domain::frame_source::{FrameSource, SourceError};
use crate::shared::frame::Frame;

/// Sleep between polls of an inner source that had nothing ready.
const IDLE_POLL: Duration = Duration::from_millis(5);

type FrameMessage = Result<Frame, SourceError>;

/// Reads an inner [`FrameSource`] on a background thread so that
/// `read_frame` never blocks.
///
/// At most one decoded frame waits in the hand-off channel. A poll with
/// nothing waiting returns `Ok(None)`.
pub struct ThreadedFrameSource {
    inner: Option<Box<dyn FrameSource>>,
    frame_rx: Option<Receiver<FrameMessage>>,
    reader_handle: Option<JoinHandle<Box<dyn FrameSource>>>,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl ThreadedFrameSource {
    pub fn new(inner: Box<dyn FrameSource>) -> Self {
        Self {
            inner: Some(inner),
            frame_rx: None,
            reader_handle: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FrameSource for ThreadedFrameSource {
    /// Starts the inner source on the calling thread, so init failures
    /// surface here, then hands it to the reader thread.
    fn start(&mut self) -> Result<(), SourceError> {
        if self.reader_handle.is_some() {
            return Ok(());
        }
        let mut inner = self
            .inner
            .take()
            .ok_or_else(|| SourceError::Init("source already consumed".into()))?;
        if let Err(e) = inner.start() {
            self.inner = Some(inner);
            return Err(e);
        }

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<FrameMessage>(1);
        self.cancelled.store(false, Ordering::Relaxed);
        self.finished.store(false, Ordering::Relaxed);
        self.reader_handle = Some(spawn_reader(
            inner,
            frame_tx,
            self.cancelled.clone(),
            self.finished.clone(),
        ));
        self.frame_rx = Some(frame_rx);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(rx) = self.frame_rx.as_ref() else {
            return Ok(None);
        };
        match rx.try_recv() {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(e)) => Err(e),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    /// Stops the reader thread, then the inner source. Safe to call more
    /// than once.
    fn stop(&mut self) -> Result<(), SourceError> {
        let Some(handle) = self.reader_handle.take() else {
            return Ok(());
        };
        self.cancelled.store(true, Ordering::Relaxed);
        // Dropping the receiver unblocks a reader waiting to hand off a frame
        self.frame_rx = None;

        let mut inner = handle
            .join()
            .map_err(|_| SourceError::Stop("reader thread panicked".into()))?;
        let result = inner.stop();
        self.inner = Some(inner);
        result
    }

    fn is_running(&self) -> bool {
        self.reader_handle.is_some()
    }

    fn is_exhausted(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
            && self.frame_rx.as_ref().map_or(true, |rx| rx.is_empty())
    }
}

impl Drop for ThreadedFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Frame source did not stop cleanly: {e}");
        }
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    frame_tx: Sender<FrameMessage>,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn FrameSource>> {
    std::thread::spawn(move || {
        while !cancelled.load(Ordering::Relaxed) {
            let message = match source.read_frame() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) if source.is_exhausted() => break,
                Ok(None) => {
                    std::thread::sleep(IDLE_POLL);
                    continue;
                }
                Err(e) => Err(e),
            };
            if frame_tx.send(message).is_err() {
                break;
            }
        }
        finished.store(true, Ordering::Relaxed);
        source
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Finite scripted source; records lifecycle calls.
    struct ScriptedSource {
        script: VecDeque<Result<Option<Frame>, SourceError>>,
        fail_start: bool,
        running: bool,
        stops: Arc<Mutex<usize>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<Frame>, SourceError>>) -> Self {
            Self {
                script: script.into(),
                fail_start: false,
                running: false,
                stops: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn start(&mut self) -> Result<(), SourceError> {
            if self.fail_start {
                return Err(SourceError::Init("no camera".into()));
            }
            self.running = true;
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }

        fn stop(&mut self) -> Result<(), SourceError> {
            *self.stops.lock().unwrap() += 1;
            self.running = false;
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn is_exhausted(&self) -> bool {
            self.script.is_empty()
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::filled(4, 4, [index as u8, 0, 0], index)
    }

    /// Polls until a frame or error arrives, or the deadline passes.
    fn poll(source: &mut ThreadedFrameSource) -> Option<Result<Frame, SourceError>> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            match source.read_frame() {
                Ok(Some(f)) => return Some(Ok(f)),
                Ok(None) if source.is_exhausted() => return None,
                Ok(None) => std::thread::sleep(Duration::from_millis(1)),
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    #[test]
    fn test_read_before_start_returns_none() {
        let mut source = ThreadedFrameSource::new(Box::new(ScriptedSource::new(vec![])));
        assert_eq!(source.read_frame().unwrap(), None);
        assert!(!source.is_running());
    }

    #[test]
    fn test_frames_delivered_in_order_and_errors_forwarded() {
        let inner = ScriptedSource::new(vec![
            Ok(Some(frame(0))),
            Ok(None),
            Err(SourceError::Read("glitch".into())),
            Ok(Some(frame(1))),
        ]);
        let mut source = ThreadedFrameSource::new(Box::new(inner));
        source.start().unwrap();

        assert_eq!(poll(&mut source).unwrap().unwrap().index(), 0);
        assert_eq!(
            poll(&mut source).unwrap().unwrap_err(),
            SourceError::Read("glitch".into())
        );
        assert_eq!(poll(&mut source).unwrap().unwrap().index(), 1);
        assert!(poll(&mut source).is_none());
        assert!(source.is_exhausted());

        source.stop().unwrap();
    }

    #[test]
    fn test_start_failure_reported_synchronously() {
        let mut inner = ScriptedSource::new(vec![]);
        inner.fail_start = true;
        let mut source = ThreadedFrameSource::new(Box::new(inner));

        assert_eq!(source.start(), Err(SourceError::Init("no camera".into())));
        assert!(!source.is_running());
        source.stop().unwrap();
    }

    #[test]
    fn test_stop_stops_inner_once_even_if_called_twice() {
        let inner = ScriptedSource::new((0..10).map(|i| Ok(Some(frame(i)))).collect());
        let stops = inner.stops.clone();
        let mut source = ThreadedFrameSource::new(Box::new(inner));
        source.start().unwrap();
        poll(&mut source);

        source.stop().unwrap();
        source.stop().unwrap();
        drop(source);

        assert_eq!(*stops.lock().unwrap(), 1);
    }

    #[test]
    fn test_stop_unblocks_reader_waiting_on_full_channel() {
        let inner = ScriptedSource::new((0..100).map(|i| Ok(Some(frame(i)))).collect());
        let mut source = ThreadedFrameSource::new(Box::new(inner));
        source.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        source.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!source.is_running());
    }
}
