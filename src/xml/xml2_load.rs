//! Drives libxml2's SAX2 parser from a `gio::InputStream`, turning its callbacks into
//! calls on [`super::XmlState`].
//!
//! libxml2 is the external streaming XML tokenizer this crate relies on; this module is
//! the only place that understands its C calling convention. Everything it hands us
//! (qualified names, attribute value bounds) is converted to this crate's own types
//! (`markup5ever::QualName`, [`super::attributes::Attributes`]) right here, at the
//! boundary, so the rest of the crate never sees libxml2 or its pointers.

use std::cell::RefCell;
use std::mem;
use std::ptr;
use std::rc::Rc;
use std::slice;
use std::str;

use gio::prelude::*;
use markup5ever::{namespace_url, ns, LocalName, Namespace, QualName};

use crate::error::LoadingError;
use crate::util::{cstr, utf8_cstr};

use super::attributes::Attributes;
use super::xml2::*;
use super::XmlState;

/// Owns the I/O side of a parse: the stream libxml2 reads from, and the first I/O
/// error seen, if any. libxml2 only gets to see "the read callback returned -1"; the
/// actual `glib::Error` is recovered from here once parsing is done.
struct StreamCtx {
    stream: gio::InputStream,
    cancellable: Option<gio::Cancellable>,
    error: Rc<RefCell<Option<glib::Error>>>,
}

unsafe extern "C" fn stream_ctx_read(
    context: *mut libc::c_void,
    buffer: *mut libc::c_char,
    len: libc::c_int,
) -> libc::c_int {
    let ctx = &mut *(context as *mut StreamCtx);

    if ctx.error.borrow().is_some() {
        return -1;
    }

    let buf: &mut [u8] = slice::from_raw_parts_mut(buffer as *mut u8, len as usize);

    match ctx.stream.read(buf, ctx.cancellable.as_ref()) {
        Ok(size) => size as libc::c_int,

        Err(e) => {
            *ctx.error.borrow_mut() = Some(e);
            -1
        }
    }
}

unsafe extern "C" fn stream_ctx_close(context: *mut libc::c_void) -> libc::c_int {
    let ctx = Box::from_raw(context as *mut StreamCtx);

    match ctx.stream.close(ctx.cancellable.as_ref()) {
        Ok(()) => 0,

        Err(e) => {
            // Don't overwrite a read error that already explains the failure.
            if ctx.error.borrow().is_none() {
                *ctx.error.borrow_mut() = Some(e);
            }
            -1
        }
    }
}

unsafe extern "C" fn sax_get_entity_cb(
    ctx: *mut libc::c_void,
    name: *const libc::c_char,
) -> xmlEntityPtr {
    let xml = &*(ctx as *const XmlState);

    assert!(!name.is_null());
    let name = utf8_cstr(name);

    xml.entity_lookup(name).unwrap_or(ptr::null_mut())
}

unsafe extern "C" fn sax_get_parameter_entity_cb(
    ctx: *mut libc::c_void,
    name: *const libc::c_char,
) -> xmlEntityPtr {
    sax_get_entity_cb(ctx, name)
}

unsafe extern "C" fn sax_entity_decl_cb(
    ctx: *mut libc::c_void,
    name: *const libc::c_char,
    type_: libc::c_int,
    _public_id: *const libc::c_char,
    _system_id: *const libc::c_char,
    content: *const libc::c_char,
) {
    let xml = &*(ctx as *const XmlState);

    assert!(!name.is_null());

    if type_ != XML_INTERNAL_GENERAL_ENTITY {
        // We don't allow external entities, and we don't support defining parameter
        // entities in the DTD; libxml2 handles internal predefined entities
        // (e.g. "&amp;") on its own.
        return;
    }

    let entity = xmlNewEntity(
        ptr::null_mut(),
        name,
        type_,
        ptr::null(),
        ptr::null(),
        content,
    );
    assert!(!entity.is_null());

    let name = utf8_cstr(name);
    xml.entity_insert(name, entity);
}

unsafe extern "C" fn sax_unparsed_entity_decl_cb(
    ctx: *mut libc::c_void,
    name: *const libc::c_char,
    public_id: *const libc::c_char,
    system_id: *const libc::c_char,
    _notation_name: *const libc::c_char,
) {
    sax_entity_decl_cb(
        ctx,
        name,
        XML_INTERNAL_GENERAL_ENTITY,
        public_id,
        system_id,
        ptr::null(),
    );
}

unsafe extern "C" fn sax_characters_cb(
    ctx: *mut libc::c_void,
    unterminated_text: *const libc::c_char,
    len: libc::c_int,
) {
    let xml = &*(ctx as *const XmlState);

    assert!(!unterminated_text.is_null());
    assert!(len >= 0);

    // libxml2 already validated this as UTF-8, but it is *not* NUL-terminated, hence
    // the byte slice instead of a CStr.
    let bytes = slice::from_raw_parts(unterminated_text as *const u8, len as usize);
    let utf8 = str::from_utf8_unchecked(bytes);

    xml.characters(utf8);
}

unsafe extern "C" fn sax_processing_instruction_cb(
    ctx: *mut libc::c_void,
    target: *const libc::c_char,
    data: *const libc::c_char,
) {
    let xml = &*(ctx as *const XmlState);

    assert!(!target.is_null());
    let target = utf8_cstr(target);

    let data = if data.is_null() { "" } else { utf8_cstr(data) };

    xml.processing_instruction(target, data);
}

unsafe extern "C" fn sax_start_element_ns_cb(
    ctx: *mut libc::c_void,
    localname: *mut libc::c_char,
    _prefix: *mut libc::c_char,
    uri: *mut libc::c_char,
    _nb_namespaces: libc::c_int,
    _namespaces: *mut *mut libc::c_char,
    nb_attributes: libc::c_int,
    _nb_defaulted: libc::c_int,
    attributes: *mut *mut libc::c_char,
) {
    let xml = &*(ctx as *const XmlState);

    assert!(!localname.is_null());
    let local = utf8_cstr(localname as *const libc::c_char);
    let uri = if uri.is_null() {
        None
    } else {
        Some(utf8_cstr(uri as *const libc::c_char))
    };

    let name = QualName::new(
        None,
        uri.map(Namespace::from).unwrap_or_else(|| ns!()),
        LocalName::from(local),
    );

    let attrs = match Attributes::new_from_xml2_attributes(
        nb_attributes as usize,
        attributes as *const *const libc::c_char,
    ) {
        Ok(attrs) => attrs,
        Err(e) => {
            xml.error(e);
            return;
        }
    };

    // A limit violation already turned this into a fatal error inside start_element();
    // there is nothing else to do with the Err(()) here.
    let _ = xml.start_element(name, attrs);
}

unsafe extern "C" fn sax_end_element_ns_cb(
    ctx: *mut libc::c_void,
    localname: *mut libc::c_char,
    _prefix: *mut libc::c_char,
    uri: *mut libc::c_char,
) {
    let xml = &*(ctx as *const XmlState);

    assert!(!localname.is_null());
    let local = utf8_cstr(localname as *const libc::c_char);
    let uri = if uri.is_null() {
        None
    } else {
        Some(utf8_cstr(uri as *const libc::c_char))
    };

    xml.end_element(QualName::new(
        None,
        uri.map(Namespace::from).unwrap_or_else(|| ns!()),
        LocalName::from(local),
    ));
}

unsafe extern "C" fn sax_serror_cb(_user_data: *mut libc::c_void, _error: xmlErrorPtr) {
    // Structured errors are picked up from xmlCtxtGetLastError() once parsing is done;
    // this callback exists only to keep libxml2 from printing them to stderr itself.
}

fn sax_handler() -> xmlSAXHandler {
    let mut h: xmlSAXHandler = unsafe { mem::zeroed() };

    h.getEntity = Some(sax_get_entity_cb);
    h.entityDecl = Some(sax_entity_decl_cb);
    h.unparsedEntityDecl = Some(sax_unparsed_entity_decl_cb);
    h.getParameterEntity = Some(sax_get_parameter_entity_cb);
    h.characters = Some(sax_characters_cb);
    h.cdataBlock = Some(sax_characters_cb);
    h.processingInstruction = Some(sax_processing_instruction_cb);
    h.startElementNs = Some(sax_start_element_ns_cb);
    h.endElementNs = Some(sax_end_element_ns_cb);
    h.serror = Some(sax_serror_cb);

    // Tells libxml2 this handler understands SAX2 (namespaced start/end element
    // callbacks); without this it falls back to the legacy startElement/endElement
    // fields, which we leave unset.
    h.initialized = XML_SAX2_MAGIC;

    h
}

fn set_xml_parse_options(parser: xmlParserCtxtPtr, unlimited_size: bool) {
    let mut options: libc::c_int = XML_PARSE_NONET | XML_PARSE_BIG_LINES;

    if unlimited_size {
        options |= XML_PARSE_HUGE;
    }

    unsafe {
        xmlCtxtUseOptions(parser, options);

        // If false, external entities work but internal ones don't; if true, it's the
        // other way around. We favor internal entities to avoid a regression.
        (*parser).replaceEntities = 1;
    }
}

fn xml2_error_to_string(xerr: xmlErrorPtr) -> String {
    unsafe {
        if xerr.is_null() {
            return String::from("Error parsing XML data");
        }

        let xerr = &*xerr;

        let file = if xerr.file.is_null() {
            "data".to_string()
        } else {
            cstr(xerr.file).into_owned()
        };

        let message = if xerr.message.is_null() {
            "-".to_string()
        } else {
            cstr(xerr.message).into_owned()
        };

        format!(
            "Error domain {} code {} on line {} column {} of {}: {}",
            xerr.domain, xerr.code, xerr.line, xerr.int2, file, message
        )
    }
}

/// A one-shot libxml2 SAX2 parser bound to an [`XmlState`] and a `gio::InputStream`.
pub struct Xml2Parser {
    ctxt: xmlParserCtxtPtr,

    // Kept alive for the ctxt's lifetime: the SAX callbacks receive a raw pointer to
    // this XmlState as their user_data, without holding their own strong reference.
    state: Rc<XmlState>,

    io_error: Rc<RefCell<Option<glib::Error>>>,
}

impl Xml2Parser {
    pub fn from_stream(
        state: Rc<XmlState>,
        unlimited_size: bool,
        stream: &gio::InputStream,
        cancellable: Option<&gio::Cancellable>,
    ) -> Result<Xml2Parser, LoadingError> {
        unsafe {
            xmlInitParser();
        }

        let io_error = Rc::new(RefCell::new(None));

        let stream_ctx = Box::new(StreamCtx {
            stream: stream.clone(),
            cancellable: cancellable.cloned(),
            error: io_error.clone(),
        });

        let mut handler = sax_handler();

        let user_data = Rc::as_ptr(&state) as *mut libc::c_void;

        let ctxt = unsafe {
            xmlCreateIOParserCtxt(
                &mut handler,
                user_data,
                Some(stream_ctx_read),
                Some(stream_ctx_close),
                Box::into_raw(stream_ctx) as *mut libc::c_void,
                XML_CHAR_ENCODING_NONE,
            )
        };

        if ctxt.is_null() {
            // xmlCreateIOParserCtxt() frees our StreamCtx itself, via stream_ctx_close,
            // when it fails.
            return Err(LoadingError::Io(String::from(
                "could not create XML parser",
            )));
        }

        set_xml_parse_options(ctxt, unlimited_size);

        Ok(Xml2Parser {
            ctxt,
            state,
            io_error,
        })
    }

    pub fn parse(self) -> Result<(), LoadingError> {
        let well_formed = unsafe { xmlParseDocument(self.ctxt) == 0 };

        if let Some(e) = self.io_error.borrow_mut().take() {
            return Err(LoadingError::from(e));
        }

        if !well_formed {
            let xerr = unsafe { xmlCtxtGetLastError(self.ctxt as *mut libc::c_void) };
            return Err(LoadingError::XmlParseError(xml2_error_to_string(xerr)));
        }

        Ok(())
    }
}

impl Drop for Xml2Parser {
    fn drop(&mut self) {
        unsafe {
            if !self.ctxt.is_null() {
                let parser = &mut *self.ctxt;

                if !parser.myDoc.is_null() {
                    xmlFreeDoc(parser.myDoc);
                    parser.myDoc = ptr::null_mut();
                }

                xmlFreeParserCtxt(self.ctxt);
            }
        }
    }
}
