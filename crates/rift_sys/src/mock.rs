//! In-process mock engine.
//!
//! Implements the complete [`RawEngineTable`] over plain Rust state so
//! the binding can be exercised without a real engine library. Objects
//! and variants are handed out as opaque integer ids disguised as
//! pointers; nothing here is ever dereferenced as engine memory.
//!
//! The mock also exposes the inspection hooks the test suites need:
//! live object/variant counts, per-object reference counts, and helpers
//! that drive registered classes the way the engine would
//! ([`instantiate_registered`], [`call_registered_virtual`]).

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::api::EngineApi;
use crate::codes::{ErrorCode, VariantTag};
use crate::error::Result;
use crate::types::{
    CreateInstanceFn, FreeInstanceFn, GetVirtualFn, PropertyDefaultFn, RawArgPtr, RawClassInfo,
    RawEngineTable, RawMethodBind, RawObject, RawVariant, VirtualCallFn, RIFT_ABI_VERSION,
};

/// Singletons the mock engine exposes by name.
pub const SINGLETON_NAMES: &[&str] = &["Engine", "Input"];

// Engine methods the mock dispatches. Lookup of anything else returns
// null, which the binding treats as a version mismatch.
const KNOWN_METHODS: &[(&str, &str)] = &[
    ("Object", "get_instance_id"),
    ("Object", "echo"),
    ("Object", "get_class_name"),
    ("RefCounted", "init_ref"),
    ("RefCounted", "get_reference_count"),
    ("Resource", "set_path"),
    ("Resource", "get_path"),
    ("Node", "set_name"),
    ("Node", "get_name"),
    ("Node", "add_child"),
    ("Node", "get_child_count"),
    ("Node2D", "set_position_x"),
    ("Node2D", "set_position_y"),
    ("Node2D", "get_position_x"),
    ("Node2D", "get_position_y"),
];

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(u64),
}

impl Value {
    fn tag(&self) -> VariantTag {
        match self {
            Value::Nil => VariantTag::Nil,
            Value::Bool(_) => VariantTag::Bool,
            Value::Int(_) => VariantTag::Int,
            Value::Float(_) => VariantTag::Float,
            Value::Str(_) => VariantTag::String,
            Value::Object(_) => VariantTag::Object,
        }
    }
}

struct MockObject {
    class: String,
    ref_count: u32,
    name: String,
    path: String,
    parent: Option<u64>,
    children: Vec<u64>,
    pos_x: f64,
    pos_y: f64,
    /// Host-side instance pointer for registered classes.
    instance: Option<usize>,
}

impl MockObject {
    fn new(class: &str, ref_count: u32) -> Self {
        Self {
            class: class.to_string(),
            ref_count,
            name: String::new(),
            path: String::new(),
            parent: None,
            children: Vec::new(),
            pos_x: 0.0,
            pos_y: 0.0,
            instance: None,
        }
    }
}

struct MockClass {
    parent: String,
    userdata: usize,
    create: Option<CreateInstanceFn>,
    free: Option<FreeInstanceFn>,
    get_virtual: Option<GetVirtualFn>,
    property_default: Option<PropertyDefaultFn>,
    /// (name, tag, hint) triples copied out of the published list.
    properties: Vec<(String, i32, Option<String>)>,
}

#[derive(Default)]
struct MockState {
    objects: HashMap<u64, MockObject>,
    next_object: u64,
    variants: HashMap<u64, Value>,
    next_variant: u64,
    binds: HashMap<(String, String), u64>,
    bind_methods: HashMap<u64, (String, String)>,
    next_bind: u64,
    classes: HashMap<String, MockClass>,
    singletons: HashMap<String, u64>,
}

impl MockState {
    fn alloc_object(&mut self, class: &str) -> u64 {
        self.next_object += 1;
        let id = self.next_object;
        let refs = if self.is_a(class, "RefCounted") { 1 } else { 0 };
        self.objects.insert(id, MockObject::new(class, refs));
        id
    }

    fn alloc_variant(&mut self, value: Value) -> u64 {
        self.next_variant += 1;
        let id = self.next_variant;
        self.variants.insert(id, value);
        id
    }

    fn parent_of(&self, class: &str) -> Option<&str> {
        match class {
            "Object" => None,
            "RefCounted" | "Node" => Some("Object"),
            "Resource" => Some("RefCounted"),
            "Node2D" => Some("Node"),
            other => self.classes.get(other).map(|c| c.parent.as_str()),
        }
    }

    fn is_a(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class);
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.parent_of(name);
        }
        false
    }

    /// Drops one reference. Returns the new count plus the cleanup the
    /// caller must run after the state lock is released.
    fn dec_ref(&mut self, id: u64) -> (u32, Option<FreeDirective>) {
        let Some(object) = self.objects.get_mut(&id) else {
            log::warn!("mock: ref_dec on unknown object {id}");
            return (0, None);
        };
        object.ref_count = object.ref_count.saturating_sub(1);
        let count = object.ref_count;
        let class = object.class.clone();
        if count == 0 && self.is_a(&class, "RefCounted") {
            (0, self.remove_object(id))
        } else {
            (count, None)
        }
    }

    fn remove_object(&mut self, id: u64) -> Option<FreeDirective> {
        let object = self.objects.remove(&id)?;
        let instance = object.instance?;
        let class = self.classes.get(&object.class)?;
        Some(FreeDirective {
            userdata: class.userdata,
            free: class.free?,
            instance,
        })
    }
}

/// A deferred `free_instance` callback. Invoked only after the state
/// lock has been dropped; the callback re-enters binding code.
struct FreeDirective {
    userdata: usize,
    free: FreeInstanceFn,
    instance: usize,
}

impl FreeDirective {
    fn run(self) {
        // Safety: userdata and instance were stored exactly as the
        // binding registered them.
        unsafe { (self.free)(self.userdata as *mut c_void, self.instance as *mut c_void) };
    }
}

fn state() -> &'static Mutex<MockState> {
    static STATE: OnceLock<Mutex<MockState>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(MockState::default()))
}

// ============================================================================
// Argument and return slot access
// ============================================================================

unsafe fn arg_ptr(args: *const RawArgPtr, index: usize) -> *const c_void {
    *args.add(index)
}

unsafe fn arg_i64(args: *const RawArgPtr, index: usize) -> i64 {
    *(arg_ptr(args, index) as *const i64)
}

unsafe fn arg_f64(args: *const RawArgPtr, index: usize) -> f64 {
    *(arg_ptr(args, index) as *const f64)
}

unsafe fn arg_id(args: *const RawArgPtr, index: usize) -> u64 {
    // Object and variant arguments store the pointer value itself.
    *(arg_ptr(args, index) as *const usize) as u64
}

unsafe fn write_i64(ret: *mut c_void, value: i64) {
    *(ret as *mut i64) = value;
}

unsafe fn write_u64(ret: *mut c_void, value: u64) {
    *(ret as *mut u64) = value;
}

unsafe fn write_f64(ret: *mut c_void, value: f64) {
    *(ret as *mut f64) = value;
}

unsafe fn write_bool(ret: *mut c_void, value: bool) {
    *(ret as *mut u8) = value as u8;
}

unsafe fn write_code(ret: *mut c_void, code: ErrorCode) {
    *(ret as *mut i32) = code.to_raw();
}

unsafe fn write_ptr(ret: *mut c_void, id: u64) {
    *(ret as *mut usize) = id as usize;
}

// ============================================================================
// Objects
// ============================================================================

unsafe extern "C" fn mock_object_construct(class_name: *const c_char) -> *mut RawObject {
    let name = match cstr(class_name) {
        Some(name) => name,
        None => return std::ptr::null_mut(),
    };

    let (id, registered) = {
        let mut state = state().lock();
        if state.parent_of(&name).is_none() && name != "Object" {
            log::debug!("mock: construct of unknown class '{name}'");
            return std::ptr::null_mut();
        }
        let id = state.alloc_object(&name);
        let registered = state
            .classes
            .get(&name)
            .and_then(|c| c.create.map(|create| (c.userdata, create)));
        (id, registered)
    };

    // Registered classes get their host instance built outside the lock;
    // the callback calls back into the engine table.
    if let Some((userdata, create)) = registered {
        let instance = create(userdata as *mut c_void, id as *mut RawObject);
        if instance.is_null() {
            state().lock().objects.remove(&id);
            log::error!("mock: instance constructor for '{name}' returned null");
            return std::ptr::null_mut();
        }
        if let Some(object) = state().lock().objects.get_mut(&id) {
            object.instance = Some(instance as usize);
        }
    }

    id as *mut RawObject
}

unsafe extern "C" fn mock_object_destroy(object: *mut RawObject) {
    let directive = state().lock().remove_object(object as u64);
    if let Some(directive) = directive {
        directive.run();
    }
}

unsafe extern "C" fn mock_singleton_lookup(name: *const c_char) -> *mut RawObject {
    let Some(name) = cstr(name) else {
        return std::ptr::null_mut();
    };
    if !SINGLETON_NAMES.contains(&name.as_str()) {
        return std::ptr::null_mut();
    }
    let mut state = state().lock();
    if let Some(id) = state.singletons.get(&name) {
        return *id as *mut RawObject;
    }
    let id = state.alloc_object("Object");
    if let Some(object) = state.objects.get_mut(&id) {
        object.name = name.clone();
    }
    state.singletons.insert(name, id);
    id as *mut RawObject
}

unsafe extern "C" fn mock_ref_inc(object: *mut RawObject) -> u32 {
    let mut state = state().lock();
    match state.objects.get_mut(&(object as u64)) {
        Some(obj) => {
            obj.ref_count += 1;
            obj.ref_count
        }
        None => {
            log::warn!("mock: ref_inc on unknown object {:?}", object);
            0
        }
    }
}

unsafe extern "C" fn mock_ref_dec(object: *mut RawObject) -> u32 {
    let (count, directive) = state().lock().dec_ref(object as u64);
    if let Some(directive) = directive {
        directive.run();
    }
    count
}

unsafe extern "C" fn mock_ref_count(object: *mut RawObject) -> u32 {
    state()
        .lock()
        .objects
        .get(&(object as u64))
        .map(|o| o.ref_count)
        .unwrap_or(0)
}

// ============================================================================
// Methods
// ============================================================================

unsafe extern "C" fn mock_method_bind_lookup(
    class_name: *const c_char,
    method_name: *const c_char,
) -> *mut RawMethodBind {
    let (Some(class), Some(method)) = (cstr(class_name), cstr(method_name)) else {
        return std::ptr::null_mut();
    };
    if !KNOWN_METHODS
        .iter()
        .any(|(c, m)| *c == class && *m == method)
    {
        return std::ptr::null_mut();
    }
    let mut state = state().lock();
    let key = (class, method);
    if let Some(id) = state.binds.get(&key) {
        return *id as *mut RawMethodBind;
    }
    state.next_bind += 1;
    let id = state.next_bind;
    state.binds.insert(key.clone(), id);
    state.bind_methods.insert(id, key);
    id as *mut RawMethodBind
}

unsafe extern "C" fn mock_method_bind_call(
    method: *mut RawMethodBind,
    receiver: *mut RawObject,
    args: *const RawArgPtr,
    arg_count: u32,
    ret: *mut c_void,
) {
    let mut state = state().lock();

    let Some((class, name)) = state.bind_methods.get(&(method as u64)).cloned() else {
        log::error!("mock: call through unknown method bind {:?}", method);
        return;
    };

    let receiver_id = receiver as u64;
    match state.objects.get(&receiver_id) {
        Some(object) if state.is_a(&object.class, &class) => {}
        Some(object) => {
            log::warn!(
                "mock: receiver of class '{}' is not a '{class}' for '{name}'",
                object.class
            );
            return;
        }
        None => {
            log::warn!("mock: call of '{class}::{name}' on dead object {receiver_id}");
            return;
        }
    }

    let takes_arg = matches!(
        (class.as_str(), name.as_str()),
        ("Object", "echo")
            | ("Resource", "set_path")
            | ("Node", "set_name")
            | ("Node", "add_child")
            | ("Node2D", "set_position_x")
            | ("Node2D", "set_position_y")
    );
    if takes_arg && (args.is_null() || arg_count == 0) {
        log::warn!("mock: '{class}::{name}' called without its argument");
        return;
    }

    match (class.as_str(), name.as_str()) {
        ("Object", "get_instance_id") => write_u64(ret, receiver_id),
        ("Object", "echo") => {
            let value = state
                .variants
                .get(&arg_id(args, 0))
                .cloned()
                .unwrap_or(Value::Nil);
            if let Value::Object(id) = value {
                // A variant copy holding an object carries its own claim.
                if let Some(obj) = state.objects.get_mut(&id) {
                    obj.ref_count += 1;
                }
            }
            let id = state.alloc_variant(value);
            write_ptr(ret, id);
        }
        ("Object", "get_class_name") => {
            let class = state.objects[&receiver_id].class.clone();
            let id = state.alloc_variant(Value::Str(class));
            write_ptr(ret, id);
        }
        ("RefCounted", "init_ref") => {
            if let Some(object) = state.objects.get_mut(&receiver_id) {
                object.ref_count = object.ref_count.max(1);
            }
            write_bool(ret, true);
        }
        ("RefCounted", "get_reference_count") => {
            write_i64(ret, state.objects[&receiver_id].ref_count as i64);
        }
        ("Resource", "set_path") => {
            if let Some(Value::Str(path)) = state.variants.get(&arg_id(args, 0)).cloned() {
                if let Some(object) = state.objects.get_mut(&receiver_id) {
                    object.path = path;
                }
            } else {
                log::warn!("mock: Resource::set_path expects a string variant");
            }
        }
        ("Resource", "get_path") => {
            let path = state.objects[&receiver_id].path.clone();
            let id = state.alloc_variant(Value::Str(path));
            write_ptr(ret, id);
        }
        ("Node", "set_name") => {
            if let Some(Value::Str(name)) = state.variants.get(&arg_id(args, 0)).cloned() {
                if let Some(object) = state.objects.get_mut(&receiver_id) {
                    object.name = name;
                }
            } else {
                log::warn!("mock: Node::set_name expects a string variant");
            }
        }
        ("Node", "get_name") => {
            let name = state.objects[&receiver_id].name.clone();
            let id = state.alloc_variant(Value::Str(name));
            write_ptr(ret, id);
        }
        ("Node", "add_child") => {
            let child_id = arg_id(args, 0);
            let refusal = if child_id == 0 || child_id == receiver_id {
                Some(ErrorCode::InvalidParameter)
            } else {
                match state.objects.get(&child_id) {
                    None => Some(ErrorCode::InvalidParameter),
                    Some(child) if !state.is_a(&child.class, "Node") => {
                        Some(ErrorCode::InvalidParameter)
                    }
                    Some(child) if child.parent.is_some() => Some(ErrorCode::Busy),
                    Some(_) => None,
                }
            };
            let code = match refusal {
                Some(code) => code,
                None => {
                    if let Some(child) = state.objects.get_mut(&child_id) {
                        child.parent = Some(receiver_id);
                    }
                    if let Some(parent) = state.objects.get_mut(&receiver_id) {
                        parent.children.push(child_id);
                    }
                    ErrorCode::Ok
                }
            };
            write_code(ret, code);
        }
        ("Node", "get_child_count") => {
            write_i64(ret, state.objects[&receiver_id].children.len() as i64);
        }
        ("Node2D", "set_position_x") => {
            let x = arg_f64(args, 0);
            if let Some(object) = state.objects.get_mut(&receiver_id) {
                object.pos_x = x;
            }
        }
        ("Node2D", "set_position_y") => {
            let y = arg_f64(args, 0);
            if let Some(object) = state.objects.get_mut(&receiver_id) {
                object.pos_y = y;
            }
        }
        ("Node2D", "get_position_x") => write_f64(ret, state.objects[&receiver_id].pos_x),
        ("Node2D", "get_position_y") => write_f64(ret, state.objects[&receiver_id].pos_y),
        _ => log::error!("mock: method '{class}::{name}' has no dispatch arm"),
    }
}

// ============================================================================
// Variants
// ============================================================================

unsafe extern "C" fn mock_variant_new_nil() -> *mut RawVariant {
    state().lock().alloc_variant(Value::Nil) as *mut RawVariant
}

unsafe extern "C" fn mock_variant_new_bool(value: bool) -> *mut RawVariant {
    state().lock().alloc_variant(Value::Bool(value)) as *mut RawVariant
}

unsafe extern "C" fn mock_variant_new_int(value: i64) -> *mut RawVariant {
    state().lock().alloc_variant(Value::Int(value)) as *mut RawVariant
}

unsafe extern "C" fn mock_variant_new_float(value: f64) -> *mut RawVariant {
    state().lock().alloc_variant(Value::Float(value)) as *mut RawVariant
}

unsafe extern "C" fn mock_variant_new_string_utf8(
    data: *const c_char,
    len: usize,
) -> *mut RawVariant {
    if data.is_null() {
        return std::ptr::null_mut();
    }
    let bytes = std::slice::from_raw_parts(data as *const u8, len);
    let text = String::from_utf8_lossy(bytes).into_owned();
    state().lock().alloc_variant(Value::Str(text)) as *mut RawVariant
}

unsafe extern "C" fn mock_variant_new_object(object: *mut RawObject) -> *mut RawVariant {
    let mut state = state().lock();
    let id = object as u64;
    if let Some(obj) = state.objects.get_mut(&id) {
        // The variant holds its own reference.
        obj.ref_count += 1;
    }
    state.alloc_variant(Value::Object(id)) as *mut RawVariant
}

unsafe extern "C" fn mock_variant_tag(variant: *const RawVariant) -> i32 {
    state()
        .lock()
        .variants
        .get(&(variant as u64))
        .map(|v| v.tag().to_raw())
        .unwrap_or(VariantTag::Nil.to_raw())
}

unsafe extern "C" fn mock_variant_get_bool(variant: *const RawVariant) -> bool {
    matches!(
        state().lock().variants.get(&(variant as u64)),
        Some(Value::Bool(true))
    )
}

unsafe extern "C" fn mock_variant_get_int(variant: *const RawVariant) -> i64 {
    match state().lock().variants.get(&(variant as u64)) {
        Some(Value::Int(v)) => *v,
        _ => 0,
    }
}

unsafe extern "C" fn mock_variant_get_float(variant: *const RawVariant) -> f64 {
    match state().lock().variants.get(&(variant as u64)) {
        Some(Value::Float(v)) => *v,
        _ => 0.0,
    }
}

unsafe extern "C" fn mock_variant_get_object(variant: *const RawVariant) -> *mut RawObject {
    match state().lock().variants.get(&(variant as u64)) {
        Some(Value::Object(id)) => *id as *mut RawObject,
        _ => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_variant_string_len(variant: *const RawVariant) -> usize {
    match state().lock().variants.get(&(variant as u64)) {
        Some(Value::Str(s)) => s.len(),
        _ => 0,
    }
}

unsafe extern "C" fn mock_variant_string_copy(
    variant: *const RawVariant,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    let state = state().lock();
    let Some(Value::Str(s)) = state.variants.get(&(variant as u64)) else {
        return 0;
    };
    let len = s.len().min(cap);
    if len > 0 && !buf.is_null() {
        std::ptr::copy_nonoverlapping(s.as_ptr(), buf as *mut u8, len);
    }
    len
}

unsafe extern "C" fn mock_variant_duplicate(variant: *const RawVariant) -> *mut RawVariant {
    let mut state = state().lock();
    let value = state
        .variants
        .get(&(variant as u64))
        .cloned()
        .unwrap_or(Value::Nil);
    if let Value::Object(id) = value {
        if let Some(obj) = state.objects.get_mut(&id) {
            obj.ref_count += 1;
        }
    }
    state.alloc_variant(value) as *mut RawVariant
}

unsafe extern "C" fn mock_variant_destroy(variant: *mut RawVariant) {
    let directive = {
        let mut state = state().lock();
        match state.variants.remove(&(variant as u64)) {
            Some(Value::Object(id)) => {
                let (_, directive) = state.dec_ref(id);
                directive
            }
            Some(_) => None,
            None => {
                log::warn!("mock: destroy of unknown variant {:?}", variant);
                None
            }
        }
    };
    if let Some(directive) = directive {
        directive.run();
    }
}

// ============================================================================
// Class Registration
// ============================================================================

unsafe extern "C" fn mock_classdb_register(info: *const RawClassInfo) -> i32 {
    if info.is_null() {
        return ErrorCode::InvalidParameter.to_raw();
    }
    let info = &*info;
    let (Some(name), Some(parent)) = (cstr(info.class_name), cstr(info.parent_name)) else {
        return ErrorCode::InvalidParameter.to_raw();
    };

    let mut properties = Vec::new();
    if !info.properties.is_null() {
        for i in 0..info.property_count as usize {
            let prop = &*info.properties.add(i);
            let Some(prop_name) = cstr(prop.name) else {
                continue;
            };
            properties.push((prop_name, prop.tag, cstr(prop.hint)));
        }
    }

    let mut state = state().lock();
    if state.parent_of(&name).is_some() || name == "Object" {
        log::warn!("mock: class '{name}' is already known");
        return ErrorCode::InvalidParameter.to_raw();
    }
    if !state.is_a(&parent, "Object") {
        return ErrorCode::NotFound.to_raw();
    }
    state.classes.insert(
        name.clone(),
        MockClass {
            parent,
            userdata: info.userdata as usize,
            create: info.create_instance,
            free: info.free_instance,
            get_virtual: info.get_virtual,
            property_default: info.property_default,
            properties,
        },
    );
    log::debug!("mock: registered class '{name}'");
    ErrorCode::Ok.to_raw()
}

unsafe extern "C" fn mock_classdb_unregister(class_name: *const c_char) -> i32 {
    let Some(name) = cstr(class_name) else {
        return ErrorCode::InvalidParameter.to_raw();
    };
    match state().lock().classes.remove(&name) {
        Some(_) => ErrorCode::Ok.to_raw(),
        None => ErrorCode::NotFound.to_raw(),
    }
}

fn cstr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // Safety: callers pass NUL-terminated strings per the ABI contract.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

// ============================================================================
// Table and Installation
// ============================================================================

static MOCK_TABLE: RawEngineTable = RawEngineTable {
    abi_version: RIFT_ABI_VERSION,
    object_construct: Some(mock_object_construct),
    object_destroy: Some(mock_object_destroy),
    singleton_lookup: Some(mock_singleton_lookup),
    method_bind_lookup: Some(mock_method_bind_lookup),
    method_bind_call: Some(mock_method_bind_call),
    ref_inc: Some(mock_ref_inc),
    ref_dec: Some(mock_ref_dec),
    ref_count: Some(mock_ref_count),
    variant_new_nil: Some(mock_variant_new_nil),
    variant_new_bool: Some(mock_variant_new_bool),
    variant_new_int: Some(mock_variant_new_int),
    variant_new_float: Some(mock_variant_new_float),
    variant_new_string_utf8: Some(mock_variant_new_string_utf8),
    variant_new_object: Some(mock_variant_new_object),
    variant_tag: Some(mock_variant_tag),
    variant_get_bool: Some(mock_variant_get_bool),
    variant_get_int: Some(mock_variant_get_int),
    variant_get_float: Some(mock_variant_get_float),
    variant_get_object: Some(mock_variant_get_object),
    variant_string_len: Some(mock_variant_string_len),
    variant_string_copy: Some(mock_variant_string_copy),
    variant_duplicate: Some(mock_variant_duplicate),
    variant_destroy: Some(mock_variant_destroy),
    classdb_register: Some(mock_classdb_register),
    classdb_unregister: Some(mock_classdb_unregister),
};

/// The mock's binding table, shaped exactly like the one a real engine
/// library exports.
pub fn engine_table() -> &'static RawEngineTable {
    &MOCK_TABLE
}

/// Installs the mock as the process-wide engine.
pub fn install() -> Result<()> {
    EngineApi::install(&MOCK_TABLE)
}

/// Installs the mock, tolerating an earlier install.
///
/// Test binaries call this from every test; the first call wins and the
/// rest are no-ops against the same table.
pub fn install_for_tests() {
    let _ = install();
}

// ============================================================================
// Inspection Hooks
// ============================================================================

/// Number of live mock objects, singletons included.
pub fn live_object_count() -> usize {
    state().lock().objects.len()
}

/// Number of live mock variant boxes.
pub fn live_variant_count() -> usize {
    state().lock().variants.len()
}

/// Engine-side reference count of an object, or `None` if it is dead.
pub fn object_ref_count(object: *mut RawObject) -> Option<u32> {
    state()
        .lock()
        .objects
        .get(&(object as u64))
        .map(|o| o.ref_count)
}

/// Whether the object is still alive on the mock's heap.
pub fn object_exists(object: *mut RawObject) -> bool {
    state().lock().objects.contains_key(&(object as u64))
}

/// Class name of a live object.
pub fn object_class(object: *mut RawObject) -> Option<String> {
    state()
        .lock()
        .objects
        .get(&(object as u64))
        .map(|o| o.class.clone())
}

/// Names of the classes registered through `classdb_register`.
pub fn registered_class_names() -> Vec<String> {
    state().lock().classes.keys().cloned().collect()
}

/// Parent class of a registered class.
pub fn registered_parent(class: &str) -> Option<String> {
    state().lock().classes.get(class).map(|c| c.parent.clone())
}

/// `(name, tag)` pairs of the property list a registered class published.
pub fn registered_property_tags(class: &str) -> Vec<(String, i32)> {
    state()
        .lock()
        .classes
        .get(class)
        .map(|c| {
            c.properties
                .iter()
                .map(|(name, tag, _)| (name.clone(), *tag))
                .collect()
        })
        .unwrap_or_default()
}

/// Constructs an instance of a registered class the way the engine
/// would: allocate the base object, then run the binding's instance
/// constructor. Returns the object and the opaque host instance.
pub fn instantiate_registered(class: &str) -> Option<(*mut RawObject, *mut c_void)> {
    let name = CString::new(class).ok()?;
    // Safety: `name` is NUL-terminated; construct handles the rest.
    let object = unsafe { mock_object_construct(name.as_ptr()) };
    if object.is_null() {
        return None;
    }
    let instance = state()
        .lock()
        .objects
        .get(&(object as u64))
        .and_then(|o| o.instance)?;
    Some((object, instance as *mut c_void))
}

/// Invokes a registered class's virtual method the way the engine
/// would: resolve through `get_virtual`, then call the thunk.
///
/// Returns `false` if the class does not override the method.
///
/// # Safety
///
/// `instance` must have come from [`instantiate_registered`] for this
/// class, `args` must match the method's declared signature, and `ret`
/// must point at a slot large enough for the declared return.
pub unsafe fn call_registered_virtual(
    class: &str,
    instance: *mut c_void,
    method: &str,
    args: &[RawArgPtr],
    ret: *mut c_void,
) -> bool {
    let Some((userdata, get_virtual)) = ({
        let state = state().lock();
        state
            .classes
            .get(class)
            .and_then(|c| c.get_virtual.map(|gv| (c.userdata, gv)))
    }) else {
        return false;
    };
    let Ok(name) = CString::new(method) else {
        return false;
    };
    let thunk: Option<VirtualCallFn> = get_virtual(userdata as *mut c_void, name.as_ptr());
    match thunk {
        Some(thunk) => {
            thunk(instance, args.as_ptr(), ret);
            true
        }
        None => false,
    }
}

/// Destroys an object created through [`instantiate_registered`],
/// releasing its host instance.
pub fn free_registered(object: *mut RawObject) {
    // Safety: same contract as an engine-side destroy.
    unsafe { mock_object_destroy(object) };
}

/// Asks a registered class for a property default the way the engine
/// would. The returned variant is owned by the caller.
pub fn property_default(class: &str, property: &str) -> Option<*mut RawVariant> {
    let (userdata, callback) = {
        let state = state().lock();
        let class = state.classes.get(class)?;
        (class.userdata, class.property_default?)
    };
    let name = CString::new(property).ok()?;
    // Safety: callback and userdata were registered together.
    let raw = unsafe { callback(userdata as *mut c_void, name.as_ptr()) };
    if raw.is_null() {
        None
    } else {
        Some(raw)
    }
}

/// Clears objects, variants and singletons.
///
/// Registered classes and interned method binds survive, because the
/// binding caches those process-wide.
pub fn reset() {
    let mut state = state().lock();
    state.objects.clear();
    state.variants.clear();
    state.singletons.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn construct(class: &str) -> *mut RawObject {
        let name = CString::new(class).unwrap();
        unsafe { mock_object_construct(name.as_ptr()) }
    }

    #[test]
    fn construct_known_and_unknown_classes() {
        let node = construct("Node");
        assert!(!node.is_null());
        assert_eq!(object_class(node).as_deref(), Some("Node"));
        unsafe { mock_object_destroy(node) };
        assert!(!object_exists(node));

        assert!(construct("NoSuchClass").is_null());
    }

    #[test]
    fn refcounted_objects_start_at_one_and_die_at_zero() {
        let res = construct("Resource");
        assert_eq!(object_ref_count(res), Some(1));
        assert_eq!(unsafe { mock_ref_inc(res) }, 2);
        assert_eq!(unsafe { mock_ref_dec(res) }, 1);
        assert_eq!(unsafe { mock_ref_dec(res) }, 0);
        assert!(!object_exists(res));
    }

    #[test]
    fn plain_objects_are_not_refcounted() {
        let node = construct("Node");
        assert_eq!(object_ref_count(node), Some(0));
        unsafe { mock_object_destroy(node) };
    }

    #[test]
    fn method_lookup_interns_binds() {
        let class = CString::new("Node").unwrap();
        let method = CString::new("set_name").unwrap();
        let a = unsafe { mock_method_bind_lookup(class.as_ptr(), method.as_ptr()) };
        let b = unsafe { mock_method_bind_lookup(class.as_ptr(), method.as_ptr()) };
        assert!(!a.is_null());
        assert_eq!(a, b);

        let missing = CString::new("no_such_method").unwrap();
        assert!(unsafe { mock_method_bind_lookup(class.as_ptr(), missing.as_ptr()) }.is_null());
    }

    #[test]
    fn node2d_position_round_trips_through_dispatch() {
        let node = construct("Node2D");
        let class = CString::new("Node2D").unwrap();
        let set_x = CString::new("set_position_x").unwrap();
        let get_x = CString::new("get_position_x").unwrap();
        let set_bind = unsafe { mock_method_bind_lookup(class.as_ptr(), set_x.as_ptr()) };
        let get_bind = unsafe { mock_method_bind_lookup(class.as_ptr(), get_x.as_ptr()) };

        let value = 12.5f64;
        let args = [&value as *const f64 as RawArgPtr];
        let mut ret = [0u8; 16];
        unsafe {
            mock_method_bind_call(set_bind, node, args.as_ptr(), 1, ret.as_mut_ptr().cast());
            mock_method_bind_call(
                get_bind,
                node,
                std::ptr::null(),
                0,
                ret.as_mut_ptr().cast(),
            );
        }
        assert_eq!(f64::from_ne_bytes(ret[..8].try_into().unwrap()), 12.5);
        unsafe { mock_object_destroy(node) };
    }

    #[test]
    fn string_variants_round_trip() {
        let text = "hello mock";
        let variant =
            unsafe { mock_variant_new_string_utf8(text.as_ptr() as *const c_char, text.len()) };
        assert_eq!(
            unsafe { mock_variant_tag(variant) },
            VariantTag::String.to_raw()
        );
        let len = unsafe { mock_variant_string_len(variant) };
        assert_eq!(len, text.len());
        let mut buf = vec![0u8; len];
        let copied =
            unsafe { mock_variant_string_copy(variant, buf.as_mut_ptr() as *mut c_char, len) };
        assert_eq!(copied, len);
        assert_eq!(std::str::from_utf8(&buf).unwrap(), text);
        unsafe { mock_variant_destroy(variant) };
    }

    #[test]
    fn object_variants_carry_a_reference() {
        let res = construct("Resource");
        assert_eq!(object_ref_count(res), Some(1));
        let variant = unsafe { mock_variant_new_object(res) };
        assert_eq!(object_ref_count(res), Some(2));
        assert_eq!(unsafe { mock_variant_get_object(variant) }, res);
        unsafe { mock_variant_destroy(variant) };
        assert_eq!(object_ref_count(res), Some(1));
        assert_eq!(unsafe { mock_ref_dec(res) }, 0);
        assert!(!object_exists(res));
    }

    #[test]
    fn add_child_reports_engine_codes() {
        let parent = construct("Node");
        let child = construct("Node2D");
        let class = CString::new("Node").unwrap();
        let method = CString::new("add_child").unwrap();
        let bind = unsafe { mock_method_bind_lookup(class.as_ptr(), method.as_ptr()) };

        let slot = child as usize;
        let args = [&slot as *const usize as RawArgPtr];
        let mut ret = [0u8; 16];
        unsafe { mock_method_bind_call(bind, parent, args.as_ptr(), 1, ret.as_mut_ptr().cast()) };
        assert_eq!(i32::from_ne_bytes(ret[..4].try_into().unwrap()), 0);

        // Re-parenting an already parented node is refused.
        unsafe { mock_method_bind_call(bind, parent, args.as_ptr(), 1, ret.as_mut_ptr().cast()) };
        assert_eq!(
            i32::from_ne_bytes(ret[..4].try_into().unwrap()),
            ErrorCode::Busy.to_raw()
        );

        unsafe {
            mock_object_destroy(child);
            mock_object_destroy(parent);
        }
    }

    #[test]
    fn singletons_are_memoised() {
        let name = CString::new("Engine").unwrap();
        let a = unsafe { mock_singleton_lookup(name.as_ptr()) };
        let b = unsafe { mock_singleton_lookup(name.as_ptr()) };
        assert!(!a.is_null());
        assert_eq!(a, b);

        let unknown = CString::new("NoSuchSingleton").unwrap();
        assert!(unsafe { mock_singleton_lookup(unknown.as_ptr()) }.is_null());
    }
}
