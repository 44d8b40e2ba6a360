//! Stack-allocated call frames for engine method invocation.
//!
//! A [`CallFrame`] packs arguments into fixed inline slots and hands the
//! engine an array of pointers into those slots. Nothing here touches the
//! heap; a frame is built, invoked and decoded entirely on the caller's
//! stack. The pointer array is materialized at [`CallFrame::invoke`] time,
//! so moving a frame around before the call is harmless.

use std::ffi::c_void;
use std::mem;
use std::ptr;

use rift_sys::api::{EngineApi, MethodBind};
use rift_sys::codes::ErrorCode;
use rift_sys::types::{RawArgPtr, RawObject, RawVariant, RIFT_MAX_CALL_ARGS};

/// Maximum number of arguments a single engine call accepts.
pub const MAX_CALL_ARGS: usize = RIFT_MAX_CALL_ARGS;

/// One argument's storage. 16 bytes holds every marshallable value:
/// primitives by value, objects and variants as pointers.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct ArgSlot {
    bytes: [u8; 16],
}

impl ArgSlot {
    const ZERO: ArgSlot = ArgSlot { bytes: [0; 16] };

    #[inline]
    fn write<T: Copy>(&mut self, value: T) {
        debug_assert!(mem::size_of::<T>() <= mem::size_of::<ArgSlot>());
        debug_assert!(mem::align_of::<T>() <= mem::align_of::<ArgSlot>());
        // Safety: the slot is 16-byte aligned and at least as large as T.
        unsafe { self.bytes.as_mut_ptr().cast::<T>().write(value) }
    }

    #[inline]
    fn read<T: Copy>(&self) -> T {
        debug_assert!(mem::size_of::<T>() <= mem::size_of::<ArgSlot>());
        // Safety: as in `write`; unwritten slots read as zero bytes.
        unsafe { self.bytes.as_ptr().cast::<T>().read() }
    }
}

/// Argument and return marshalling for one engine call.
///
/// Typical wrapper usage: push arguments in the engine's declared order,
/// invoke, then decode the return slot with the matching `ret_*` reader.
/// Argument types are not validated; the generated wrappers are the
/// contract.
pub struct CallFrame {
    slots: [ArgSlot; MAX_CALL_ARGS],
    ret: ArgSlot,
    len: usize,
}

impl CallFrame {
    #[inline]
    pub fn new() -> Self {
        CallFrame {
            slots: [ArgSlot::ZERO; MAX_CALL_ARGS],
            ret: ArgSlot::ZERO,
            len: 0,
        }
    }

    #[inline]
    pub fn arg_count(&self) -> usize {
        self.len
    }

    /// Clears pushed arguments and the return slot so the frame can be
    /// reused for another call.
    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
        self.ret = ArgSlot::ZERO;
    }

    #[inline]
    fn next_slot(&mut self) -> &mut ArgSlot {
        if self.len == MAX_CALL_ARGS {
            panic!("call frame overflow: the engine accepts at most {MAX_CALL_ARGS} arguments");
        }
        let slot = &mut self.slots[self.len];
        self.len += 1;
        slot
    }

    // ----- argument writers -----

    #[inline]
    pub fn push_bool(&mut self, value: bool) {
        self.next_slot().write(value);
    }

    #[inline]
    pub fn push_i64(&mut self, value: i64) {
        self.next_slot().write(value);
    }

    #[inline]
    pub fn push_u64(&mut self, value: u64) {
        self.next_slot().write(value);
    }

    #[inline]
    pub fn push_f64(&mut self, value: f64) {
        self.next_slot().write(value);
    }

    /// Pushes an object argument. The slot stores the pointer value; a
    /// null pointer arrives at the engine as a null object.
    #[inline]
    pub fn push_object_ptr(&mut self, object: *mut RawObject) {
        self.next_slot().write(object);
    }

    /// Pushes a variant argument by pointer. The box must stay alive
    /// until the call returns.
    #[inline]
    pub fn push_variant_ptr(&mut self, variant: *mut RawVariant) {
        self.next_slot().write(variant);
    }

    // ----- invocation -----

    /// Calls `bind` on `receiver` with the pushed arguments.
    ///
    /// The return slot is zeroed first, so decoding after a void call
    /// yields zero values.
    ///
    /// # Safety
    ///
    /// `receiver` must be a live engine object (or null where the method
    /// tolerates it), and the pushed arguments must match the method's
    /// declared signature. Pointer arguments must remain valid for the
    /// duration of the call.
    pub unsafe fn invoke(&mut self, bind: MethodBind, receiver: *mut RawObject) {
        let api = EngineApi::get();
        self.ret = ArgSlot::ZERO;

        let mut args: [RawArgPtr; MAX_CALL_ARGS] = [ptr::null(); MAX_CALL_ARGS];
        for i in 0..self.len {
            args[i] = self.slots[i].bytes.as_ptr() as RawArgPtr;
        }

        (api.method_bind_call)(
            bind.as_raw(),
            receiver,
            args.as_ptr(),
            self.len as u32,
            self.ret.bytes.as_mut_ptr() as *mut c_void,
        );
    }

    // ----- return readers -----

    #[inline]
    pub fn ret_bool(&self) -> bool {
        self.ret.read::<u8>() != 0
    }

    #[inline]
    pub fn ret_i64(&self) -> i64 {
        self.ret.read()
    }

    #[inline]
    pub fn ret_u64(&self) -> u64 {
        self.ret.read()
    }

    #[inline]
    pub fn ret_f64(&self) -> f64 {
        self.ret.read()
    }

    #[inline]
    pub fn ret_error_code(&self) -> ErrorCode {
        ErrorCode::from_raw(self.ret.read::<i32>())
    }

    #[inline]
    pub fn ret_object_ptr(&self) -> *mut RawObject {
        self.ret.read()
    }

    #[inline]
    pub fn ret_variant_ptr(&self) -> *mut RawVariant {
        self.ret.read()
    }
}

impl Default for CallFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_with_zero_return() {
        let frame = CallFrame::new();
        assert_eq!(frame.arg_count(), 0);
        assert_eq!(frame.ret_i64(), 0);
        assert_eq!(frame.ret_f64(), 0.0);
        assert!(!frame.ret_bool());
        assert!(frame.ret_object_ptr().is_null());
    }

    #[test]
    fn pushes_count_arguments() {
        let mut frame = CallFrame::new();
        frame.push_i64(1);
        frame.push_f64(2.5);
        frame.push_bool(true);
        frame.push_object_ptr(std::ptr::null_mut());
        assert_eq!(frame.arg_count(), 4);
        frame.reset();
        assert_eq!(frame.arg_count(), 0);
    }

    #[test]
    fn accepts_exactly_max_args() {
        let mut frame = CallFrame::new();
        for i in 0..MAX_CALL_ARGS {
            frame.push_i64(i as i64);
        }
        assert_eq!(frame.arg_count(), MAX_CALL_ARGS);
    }

    #[test]
    #[should_panic(expected = "call frame overflow")]
    fn overflow_panics() {
        let mut frame = CallFrame::new();
        for i in 0..=MAX_CALL_ARGS {
            frame.push_i64(i as i64);
        }
    }

    #[test]
    fn slot_storage_is_inline() {
        // The whole frame lives on the stack; moving it must not involve
        // any allocator traffic.
        assert!(mem::size_of::<CallFrame>() <= (MAX_CALL_ARGS + 2) * 16 + 16);
    }
}
