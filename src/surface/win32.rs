//! Native surface docked into the Windows taskbar.
//!
//! The window is created as a child of `Shell_TrayWnd/ReBarWindow32`, color
//! keyed on black so only text shows, and sized to the right part of the
//! rebar. The window procedure reaches its per-window inbox through the
//! `GWLP_USERDATA` slot; nothing is global.

use std::cell::RefCell;

use windows::Win32::Foundation::{
    COLORREF, ERROR_CLASS_ALREADY_EXISTS, GetLastError, HWND, LPARAM, LRESULT, RECT, SIZE, WPARAM,
};
use windows::Win32::Graphics::Gdi::{
    BLACK_BRUSH, BeginPaint, CreateFontIndirectW, DT_NOCLIP, DT_NOPREFIX, DT_RIGHT,
    DT_SINGLELINE, DT_VCENTER, DeleteObject, DrawTextW, EndPaint, FW_NORMAL, FillRect, GetDC,
    GetStockObject, GetTextExtentPoint32W, HBRUSH, HDC, HFONT, LOGFONTW, PAINTSTRUCT, ReleaseDC,
    SelectObject, SetBkColor, SetTextColor, ValidateRect,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CS_HREDRAW, CS_VREDRAW, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    FindWindowExW, GWL_STYLE, GWLP_USERDATA, GetWindowLongPtrW, GetWindowRect, HCURSOR,
    IDC_ARROW, LWA_COLORKEY, LoadCursorW, MSG, PM_REMOVE, PeekMessageW, RegisterClassExW,
    SET_WINDOW_POS_FLAGS, SW_SHOW, SetCursor, SetLayeredWindowAttributes, SetParent,
    SetWindowLongPtrW, SetWindowPos, ShowWindow, TranslateMessage, UpdateWindow, WINDOW_STYLE,
    WM_DESTROY, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_PAINT, WM_SETCURSOR, WM_SIZE, WNDCLASSEXW,
    WS_CAPTION, WS_CHILD, WS_EX_LAYERED, WS_POPUP,
};
use windows::core::{PCWSTR, w};

use crate::block::Color;
use crate::command::FontSpec;
use crate::error::{BarError, Result};
use crate::geometry::Size;

use super::{Surface, SurfaceEvent, SurfaceFactory, SurfaceOptions, docked_geometry};

const CLASS_NAME: PCWSTR = w!("winbarC");

struct WindowInbox {
    events: RefCell<Vec<SurfaceEvent>>,
    cursor: HCURSOR,
}

impl WindowInbox {
    fn push(&self, event: SurfaceEvent) {
        if let Ok(mut events) = self.events.try_borrow_mut() {
            events.push(event);
        }
    }
}

fn last_error_text() -> String {
    windows::core::Error::from_win32().message().to_string()
}

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

fn low_word(value: isize) -> i32 {
    (value & 0xffff) as i16 as i32
}

fn high_word(value: isize) -> i32 {
    ((value >> 16) & 0xffff) as i16 as i32
}

unsafe extern "system" fn bar_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let inbox = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as *const WindowInbox;
    if inbox.is_null() {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    }
    // SAFETY: the pointer is installed by `Win32Surface::open` and cleared in
    // `release` before the inbox is freed; both run on this thread.
    let inbox = unsafe { &*inbox };

    match msg {
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            unsafe {
                BeginPaint(hwnd, &mut ps);
                let _ = EndPaint(hwnd, &ps);
            }
            inbox.push(SurfaceEvent::Expose);
            return LRESULT(0);
        }
        WM_SETCURSOR => {
            unsafe { SetCursor(inbox.cursor) };
            return LRESULT(1);
        }
        WM_LBUTTONDOWN => inbox.push(SurfaceEvent::PointerDown {
            x: low_word(lparam.0),
        }),
        WM_LBUTTONUP => inbox.push(SurfaceEvent::PointerUp {
            x: low_word(lparam.0),
        }),
        WM_SIZE => inbox.push(SurfaceEvent::Resized(Size::new(
            low_word(lparam.0),
            high_word(lparam.0),
        ))),
        WM_DESTROY => inbox.push(SurfaceEvent::Closed),
        _ => {}
    }

    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

fn create_font(spec: &FontSpec) -> Result<HFONT> {
    let mut logfont = LOGFONTW {
        lfHeight: spec.size,
        lfWeight: FW_NORMAL.0 as i32,
        ..Default::default()
    };
    for (slot, unit) in logfont
        .lfFaceName
        .iter_mut()
        .zip(spec.name.encode_utf16().take(31))
    {
        *slot = unit;
    }
    let font = unsafe { CreateFontIndirectW(&logfont) };
    if font.is_invalid() {
        return Err(BarError::Font(format!(
            "cannot create `{}` at {}: {}",
            spec.name,
            spec.size,
            last_error_text()
        )));
    }
    Ok(font)
}

/// Factory that performs the taskbar docking sequence on the UI thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Factory;

impl SurfaceFactory for Win32Factory {
    fn open(self: Box<Self>, options: &SurfaceOptions) -> Result<Box<dyn Surface>> {
        Ok(Box::new(Win32Surface::open(options)?))
    }
}

pub struct Win32Surface {
    hwnd: HWND,
    inbox: *mut WindowInbox,
    font: HFONT,
    dc: Option<HDC>,
    size: Size,
}

impl Win32Surface {
    pub fn factory() -> Win32Factory {
        Win32Factory
    }

    pub fn open(options: &SurfaceOptions) -> Result<Self> {
        let tray = unsafe { FindWindowExW(HWND::default(), HWND::default(), w!("Shell_TrayWnd"), PCWSTR::null()) }
            .map_err(|err| BarError::ContainerNotFound(format!("Shell_TrayWnd: {}", err.message())))?;
        let rebar = unsafe { FindWindowExW(tray, HWND::default(), w!("ReBarWindow32"), PCWSTR::null()) }
            .map_err(|err| BarError::ContainerNotFound(format!("ReBarWindow32: {}", err.message())))?;

        let mut rect = RECT::default();
        unsafe { GetWindowRect(rebar, &mut rect) }
            .map_err(|err| BarError::ContainerNotFound(err.message().to_string()))?;
        let container = Size::new(rect.right - rect.left, rect.bottom - rect.top);

        let hinstance = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|err| BarError::ClassRegistration(err.message().to_string()))?;
        let class = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(bar_wndproc),
            hInstance: hinstance.into(),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };
        if unsafe { RegisterClassExW(&class) } == 0 && unsafe { GetLastError() } != ERROR_CLASS_ALREADY_EXISTS {
            return Err(BarError::ClassRegistration(last_error_text()));
        }

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_LAYERED,
                CLASS_NAME,
                w!(""),
                WINDOW_STYLE(0),
                0,
                0,
                100,
                100,
                HWND::default(),
                None,
                hinstance,
                None,
            )
        }
        .map_err(|err| BarError::SurfaceCreation(err.message().to_string()))?;

        let font = match create_font(&options.font) {
            Ok(font) => font,
            Err(err) => {
                unsafe {
                    let _ = DestroyWindow(hwnd);
                }
                return Err(err);
            }
        };
        let cursor = unsafe { LoadCursorW(None, IDC_ARROW) }.unwrap_or_default();
        let inbox = Box::into_raw(Box::new(WindowInbox {
            events: RefCell::new(Vec::new()),
            cursor,
        }));

        let (left, size) = docked_geometry(container, options.width_fraction);
        let surface = Self {
            hwnd,
            inbox,
            font,
            dc: None,
            size,
        };

        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, inbox as isize);
            SetParent(hwnd, rebar).map_err(|err| BarError::SurfaceCreation(err.message().to_string()))?;
            let style = GetWindowLongPtrW(hwnd, GWL_STYLE) as u32;
            let style = (style & !(WS_POPUP.0 | WS_CAPTION.0)) | WS_CHILD.0;
            SetWindowLongPtrW(hwnd, GWL_STYLE, style as isize);
            SetLayeredWindowAttributes(hwnd, COLORREF(0), 0, LWA_COLORKEY)
                .map_err(|err| BarError::SurfaceCreation(err.message().to_string()))?;
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = UpdateWindow(hwnd);
            SetWindowPos(
                hwnd,
                HWND::default(),
                left,
                container.height - size.height,
                size.width,
                size.height,
                SET_WINDOW_POS_FLAGS(0),
            )
            .map_err(|err| BarError::SurfaceCreation(err.message().to_string()))?;
        }

        Ok(surface)
    }

    fn with_dc<T>(&mut self, f: impl FnOnce(HDC) -> T) -> T {
        if let Some(dc) = self.dc {
            return f(dc);
        }
        unsafe {
            let dc = GetDC(self.hwnd);
            let previous = SelectObject(dc, self.font);
            let out = f(dc);
            SelectObject(dc, previous);
            ReleaseDC(self.hwnd, dc);
            out
        }
    }
}

impl Surface for Win32Surface {
    fn size(&self) -> Size {
        self.size
    }

    fn pump(&mut self) -> Result<Vec<SurfaceEvent>> {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        // SAFETY: the inbox outlives the window and is only touched on this thread.
        let events = std::mem::take(&mut *unsafe { &*self.inbox }.events.borrow_mut());
        for event in &events {
            if let SurfaceEvent::Resized(size) = event {
                self.size = *size;
            }
        }
        Ok(events)
    }

    fn set_font(&mut self, font: &FontSpec) -> Result<()> {
        let replacement = create_font(font)?;
        unsafe {
            let _ = DeleteObject(self.font);
        }
        self.font = replacement;
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        unsafe {
            let dc = GetDC(self.hwnd);
            if dc.is_invalid() {
                return Err(BarError::Backend(last_error_text()));
            }
            let rect = RECT {
                left: 0,
                top: 0,
                right: self.size.width,
                bottom: self.size.height,
            };
            FillRect(dc, &rect, HBRUSH(GetStockObject(BLACK_BRUSH).0));
            SetBkColor(dc, COLORREF(0));
            SelectObject(dc, self.font);
            self.dc = Some(dc);
        }
        Ok(())
    }

    fn measure(&mut self, text: &str) -> i32 {
        let units = wide(text);
        self.with_dc(|dc| {
            let mut extent = SIZE::default();
            let ok = unsafe { GetTextExtentPoint32W(dc, &units, &mut extent) };
            if ok.as_bool() { extent.cx } else { 0 }
        })
    }

    fn draw_text_right(&mut self, text: &str, color: Color, right_edge: i32) -> Result<()> {
        let Some(dc) = self.dc else {
            return Err(BarError::Backend("draw outside of a frame".to_string()));
        };
        let mut units = wide(text);
        let mut rect = RECT {
            left: 0,
            top: 0,
            right: right_edge,
            bottom: self.size.height,
        };
        unsafe {
            SetTextColor(dc, COLORREF(color.to_bgr()));
            DrawTextW(
                dc,
                &mut units,
                &mut rect,
                DT_SINGLELINE | DT_NOCLIP | DT_RIGHT | DT_VCENTER | DT_NOPREFIX,
            );
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        if let Some(dc) = self.dc.take() {
            unsafe {
                ReleaseDC(self.hwnd, dc);
                let _ = ValidateRect(self.hwnd, None);
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.inbox.is_null() {
            return;
        }
        let _ = self.end_frame();
        unsafe {
            let _ = DeleteObject(self.font);
            SetWindowLongPtrW(self.hwnd, GWLP_USERDATA, 0);
            let _ = DestroyWindow(self.hwnd);
            drop(Box::from_raw(self.inbox));
        }
        self.inbox = std::ptr::null_mut();
    }
}

impl Drop for Win32Surface {
    fn drop(&mut self) {
        self.release();
    }
}
