//! Windows raw-input capture.
//!
//! A hidden message-only window registers for raw mouse and keyboard input
//! with `RIDEV_INPUTSINK`, so notifications arrive even while another
//! application has focus.  The window and its message loop live on a
//! dedicated thread; the window procedure decodes each `WM_INPUT` into a
//! [`RawInputEvent`] and hands it off with a non-blocking `try_send`.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::ffi::c_void;
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use rmac_core::Timebase;
use tracing::{debug, warn};
use windows::core::w;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::{
    GetRawInputData, RegisterRawInputDevices, HRAWINPUT, RAWINPUT, RAWINPUTDEVICE,
    RAWINPUTHEADER, RIDEV_INPUTSINK, RID_INPUT, RIM_TYPEKEYBOARD, RIM_TYPEMOUSE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetCursorPos, GetMessageW,
    PostThreadMessageW, RegisterClassW, HWND_MESSAGE, MSG, WINDOW_EX_STYLE, WINDOW_STYLE,
    WM_INPUT, WM_QUIT, WNDCLASSW,
};

use super::raw::{self, RawMouseReport};
use super::{CaptureError, InputSource, RawInputEvent};

/// HID usage page and usages for the devices we listen to.
const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_MOUSE: u16 = 0x02;
const USAGE_KEYBOARD: u16 = 0x06;

/// Per-thread state reached from the window procedure.
struct SinkContext {
    tx: SyncSender<RawInputEvent>,
    timebase: Arc<Timebase>,
    dropped: Arc<AtomicU64>,
    /// Reused across notifications.  `u64` elements keep `RAWINPUT` aligned.
    buffer: Vec<u64>,
}

thread_local! {
    static SINK: RefCell<Option<SinkContext>> = const { RefCell::new(None) };
}

struct Running {
    thread_id: u32,
    join: JoinHandle<()>,
}

/// Raw-input capture source backed by a message-only window.
pub struct WindowsRawInputSource {
    started: AtomicBool,
    running: Mutex<Option<Running>>,
    dropped: Arc<AtomicU64>,
}

impl WindowsRawInputSource {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            running: Mutex::new(None),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for WindowsRawInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for WindowsRawInputSource {
    fn start(
        &self,
        timebase: Arc<Timebase>,
        capacity: usize,
    ) -> Result<Receiver<RawInputEvent>, CaptureError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let context = SinkContext {
            tx,
            timebase,
            dropped: Arc::clone(&self.dropped),
            buffer: Vec::with_capacity(64),
        };

        let join = thread::Builder::new()
            .name("rmac-raw-input".to_string())
            .spawn(move || run_sink_window(context, ready_tx))
            .map_err(|e| CaptureError::WindowCreationFailed(e.to_string()))?;

        let thread_id = ready_rx
            .recv()
            .map_err(|_| CaptureError::WindowCreationFailed("sink thread exited".to_string()))??;

        if let Ok(mut running) = self.running.lock() {
            *running = Some(Running { thread_id, join });
        }
        debug!(thread_id, "raw input sink started");
        Ok(rx)
    }

    fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(running) = running else {
            return;
        };
        // SAFETY: posting WM_QUIT to a thread id we created; fails harmlessly
        // if the thread has already exited.
        unsafe {
            let _ = PostThreadMessageW(running.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        if running.join.join().is_err() {
            warn!("raw input sink thread panicked");
        }
        debug!("raw input sink stopped");
    }

    fn dropped_notifications(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for WindowsRawInputSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Entry point for the sink thread: create the window, register for raw
/// input, report readiness, then pump messages until `WM_QUIT`.
fn run_sink_window(context: SinkContext, ready: SyncSender<Result<u32, CaptureError>>) {
    let hwnd = match create_sink_window() {
        Ok(hwnd) => hwnd,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = register_raw_input(hwnd) {
        // SAFETY: hwnd was created on this thread.
        unsafe {
            let _ = DestroyWindow(hwnd);
        }
        let _ = ready.send(Err(e));
        return;
    }

    SINK.with(|cell| *cell.borrow_mut() = Some(context));
    // SAFETY: no preconditions.
    let thread_id = unsafe { GetCurrentThreadId() };
    let _ = ready.send(Ok(thread_id));

    let mut msg = MSG::default();
    // SAFETY: standard Win32 GetMessage/DispatchMessage loop on the thread
    // that owns the window.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        let _ = DestroyWindow(hwnd);
    }

    // Dropping the context drops the sender, which closes the channel.
    SINK.with(|cell| cell.borrow_mut().take());
}

fn create_sink_window() -> Result<HWND, CaptureError> {
    let class_name = w!("rmac_raw_input_sink");
    // SAFETY: plain Win32 calls with valid, 'static arguments.
    unsafe {
        let module =
            GetModuleHandleW(None).map_err(|e| CaptureError::WindowCreationFailed(e.to_string()))?;
        let class = WNDCLASSW {
            lpfnWndProc: Some(sink_window_proc),
            hInstance: module.into(),
            lpszClassName: class_name,
            ..Default::default()
        };
        // Zero means failure, including "class already exists" on a second
        // session in the same process; window creation below still succeeds
        // in that case.
        RegisterClassW(&class);

        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            class_name,
            w!("rmac"),
            WINDOW_STYLE::default(),
            0,
            0,
            0,
            0,
            Some(HWND_MESSAGE),
            None,
            Some(module.into()),
            None,
        )
        .map_err(|e| CaptureError::WindowCreationFailed(e.to_string()))
    }
}

fn register_raw_input(hwnd: HWND) -> Result<(), CaptureError> {
    let devices = [
        RAWINPUTDEVICE {
            usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
            usUsage: USAGE_MOUSE,
            dwFlags: RIDEV_INPUTSINK,
            hwndTarget: hwnd,
        },
        RAWINPUTDEVICE {
            usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
            usUsage: USAGE_KEYBOARD,
            dwFlags: RIDEV_INPUTSINK,
            hwndTarget: hwnd,
        },
    ];
    // SAFETY: `devices` is a valid slice for the duration of the call.
    unsafe { RegisterRawInputDevices(&devices, size_of::<RAWINPUTDEVICE>() as u32) }
        .map_err(|e| CaptureError::RawInputRegistrationFailed(e.to_string()))
}

/// Window procedure for the sink window.
///
/// # Safety
///
/// Called by Windows on the sink thread.  Must return quickly.
unsafe extern "system" fn sink_window_proc(
    hwnd: HWND,
    msg: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if msg == WM_INPUT {
        SINK.with(|cell| {
            if let Ok(mut guard) = cell.try_borrow_mut() {
                if let Some(context) = guard.as_mut() {
                    context.on_raw_input(HRAWINPUT(l_param.0 as *mut c_void));
                }
            }
        });
    }
    // SAFETY: WM_INPUT requires DefWindowProc for system cleanup.
    DefWindowProcW(hwnd, msg, w_param, l_param)
}

impl SinkContext {
    fn on_raw_input(&mut self, handle: HRAWINPUT) {
        let header_size = size_of::<RAWINPUTHEADER>() as u32;
        let mut size = 0u32;
        // SAFETY: querying the required size with a null buffer.
        unsafe {
            GetRawInputData(handle, RID_INPUT, None, &mut size, header_size);
        }
        if size == 0 {
            return;
        }

        let words = (size as usize).div_ceil(size_of::<u64>());
        if self.buffer.len() < words {
            self.buffer.resize(words, 0);
        }

        // SAFETY: the buffer holds at least `size` bytes.
        let copied = unsafe {
            GetRawInputData(
                handle,
                RID_INPUT,
                Some(self.buffer.as_mut_ptr() as *mut c_void),
                &mut size,
                header_size,
            )
        };
        if copied != size {
            return;
        }

        let at_micros = self.timebase.elapsed_micros();
        // SAFETY: GetRawInputData wrote a complete, 8-byte aligned RAWINPUT.
        let input = unsafe { &*(self.buffer.as_ptr() as *const RAWINPUT) };

        let event = if input.header.dwType == RIM_TYPEMOUSE.0 {
            // SAFETY: dwType selects the mouse member of the union.
            let (mouse, buttons) = unsafe { (input.data.mouse, input.data.mouse.Anonymous.Anonymous) };
            let report = RawMouseReport {
                flags: mouse.usFlags.0,
                button_flags: buttons.usButtonFlags,
                button_data: buttons.usButtonData,
                last_x: mouse.lLastX,
                last_y: mouse.lLastY,
            };
            let mut cursor = POINT::default();
            // SAFETY: `cursor` is a valid out-pointer.  On failure the
            // position stays (0, 0).
            unsafe {
                let _ = GetCursorPos(&mut cursor);
            }
            raw::mouse_event(report, (cursor.x, cursor.y), at_micros)
        } else if input.header.dwType == RIM_TYPEKEYBOARD.0 {
            // SAFETY: dwType selects the keyboard member of the union.
            let keyboard = unsafe { input.data.keyboard };
            let has_device = !input.header.hDevice.is_invalid();
            raw::key_event(keyboard.VKey, keyboard.Flags, has_device, at_micros)
        } else {
            return;
        };

        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Receiver gone: the session is shutting down.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
