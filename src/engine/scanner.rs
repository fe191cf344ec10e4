//! Content stream scanning for image placements.
//!
//! Walks a page's content stream (and the Form XObjects it invokes) tracking
//! the graphics state matrix stack, and records where each image XObject is
//! painted.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;

use crate::decode::inflate;

/// Nesting limit for Form XObjects invoking other forms.
const MAX_FORM_DEPTH: usize = 16;

/// 2D transformation matrix [a, b, c, d, e, f]
/// Represents: | a b 0 |
///             | c d 0 |
///             | e f 1 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub fn identity() -> Self {
        Matrix {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Concatenate another matrix: self * other
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn inverse(&self) -> Option<Matrix> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Matrix {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }

    /// Bounding box (x0, y0, x1, y1) of the unit square under this matrix.
    pub fn unit_square_bounds(&self) -> (f32, f32, f32, f32) {
        let corners = [
            self.transform(0.0, 0.0),
            self.transform(1.0, 0.0),
            self.transform(0.0, 1.0),
            self.transform(1.0, 1.0),
        ];
        corners.iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }

    /// Length of the transformed image x axis
    pub fn scale_x(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Length of the transformed image y axis
    pub fn scale_y(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// An image XObject painted with a given CTM.
#[derive(Debug, Clone)]
pub(crate) struct ImagePlacement {
    pub object_id: ObjectId,
    pub matrix: Matrix,
}

/// Decompress a stream's content
pub(crate) fn decompress_stream(stream: &Stream) -> Vec<u8> {
    let filters = stream_filters(&stream.dict);
    let mut data = stream.content.clone();

    for filter_name in filters {
        match filter_name.as_str() {
            "FlateDecode" | "Fl" => match inflate(&data) {
                Ok(decoded) => data = decoded,
                Err(_) => return stream.content.clone(),
            },
            _ => {
                // Unknown filter, return as-is
                return data;
            }
        }
    }

    data
}

/// Filter names of a stream dictionary, outermost first.
pub(crate) fn stream_filters(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).to_string()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|f| match f {
                Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn name_of(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key) {
        Ok(Object::Name(n)) => Some(String::from_utf8_lossy(n).to_string()),
        _ => None,
    }
}

pub(crate) fn number_of(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n),
        _ => None,
    }
}

/// Resolve a reference to get the actual object
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        _ => Some(obj),
    }
}

/// Look up a page attribute, following `/Parent` links for inherited entries.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = page_dict;
    let mut seen = HashSet::new();
    loop {
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        let parent_id = match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => *id,
            _ => return None,
        };
        if !seen.insert(parent_id) {
            return None;
        }
        dict = match doc.get_object(parent_id) {
            Ok(Object::Dictionary(d)) => d,
            _ => return None,
        };
    }
}

/// Get XObject entries from resources in dictionary order (name, object ID)
pub(crate) fn xobjects_in(doc: &Document, resources: &Object) -> Vec<(String, ObjectId)> {
    let mut result = Vec::new();

    let res_dict = match resolve(doc, resources) {
        Some(Object::Dictionary(d)) => d,
        _ => return result,
    };

    let xobj_dict = match res_dict.get(b"XObject").ok().and_then(|x| resolve(doc, x)) {
        Some(Object::Dictionary(d)) => d,
        _ => return result,
    };

    for (name, value) in xobj_dict.iter() {
        if let Object::Reference(obj_id) = value {
            result.push((String::from_utf8_lossy(name).to_string(), *obj_id));
        }
    }

    result
}

/// Get content data from a Contents entry (may be stream or array of streams)
pub(crate) fn content_data(doc: &Document, contents: &Object) -> Vec<u8> {
    match contents {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(obj) => content_data(doc, obj),
            Err(_) => Vec::new(),
        },
        Object::Stream(stream) => decompress_stream(stream),
        Object::Array(arr) => {
            let mut combined = Vec::new();
            for item in arr {
                combined.extend(content_data(doc, item));
                combined.push(b'\n');
            }
            combined
        }
        _ => Vec::new(),
    }
}

/// Collect image object IDs referenced from a page's resources, in resource
/// order, descending into Form XObjects. Each image is listed once.
pub(crate) fn collect_page_images(doc: &Document, page_dict: &Dictionary) -> Vec<ObjectId> {
    let mut images = Vec::new();
    let mut seen = HashSet::new();

    if let Some(resources) = inherited_attribute(doc, page_dict, b"Resources") {
        for (_, obj_id) in xobjects_in(doc, resources) {
            collect_images_recursive(doc, obj_id, resources, &mut images, &mut seen);
        }
    }

    images
}

/// `parent_resources` stands in for a form's own when it has none.
fn collect_images_recursive(
    doc: &Document,
    obj_id: ObjectId,
    parent_resources: &Object,
    images: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) {
    if !seen.insert(obj_id) {
        return;
    }

    let stream = match doc.get_object(obj_id) {
        Ok(Object::Stream(s)) => s,
        _ => return,
    };

    match name_of(&stream.dict, b"Subtype").as_deref() {
        Some("Image") => images.push(obj_id),
        Some("Form") => {
            let resources = stream.dict.get(b"Resources").unwrap_or(parent_resources);
            for (_, child_id) in xobjects_in(doc, resources) {
                collect_images_recursive(doc, child_id, resources, images, seen);
            }
        }
        _ => {}
    }
}

/// Split a content stream into tokens.
///
/// Simplified: literal strings are kept whole, arrays are split at brackets,
/// `%` comments and inline image data (between `ID` and `EI`) are dropped.
fn tokenize(content: &[u8]) -> Vec<String> {
    let content_str = String::from_utf8_lossy(content);

    let mut tokens: Vec<String> = Vec::new();
    let mut in_string = false;
    let mut in_comment = false;
    let mut paren_depth = 0;
    let mut current_token = String::new();

    for ch in content_str.chars() {
        if in_comment {
            in_comment = ch != '\n' && ch != '\r';
            continue;
        }
        if in_string {
            current_token.push(ch);
            if ch == '(' {
                paren_depth += 1;
            } else if ch == ')' {
                paren_depth -= 1;
                if paren_depth == 0 {
                    in_string = false;
                    tokens.push(std::mem::take(&mut current_token));
                }
            }
        } else {
            match ch {
                '%' => {
                    if !current_token.is_empty() {
                        tokens.push(std::mem::take(&mut current_token));
                    }
                    in_comment = true;
                }
                '(' => {
                    if !current_token.is_empty() {
                        tokens.push(std::mem::take(&mut current_token));
                    }
                    in_string = true;
                    paren_depth = 1;
                    current_token.push(ch);
                }
                ' ' | '\t' | '\n' | '\r' | '\x0c' | '\0' => {
                    if !current_token.is_empty() {
                        tokens.push(std::mem::take(&mut current_token));
                    }
                }
                '[' | ']' => {
                    if !current_token.is_empty() {
                        tokens.push(std::mem::take(&mut current_token));
                    }
                    tokens.push(ch.to_string());
                }
                _ => current_token.push(ch),
            }
        }
    }
    if !current_token.is_empty() {
        tokens.push(current_token);
    }

    // Drop inline image payloads
    let mut filtered = Vec::with_capacity(tokens.len());
    let mut in_inline_image = false;
    for token in tokens {
        if in_inline_image {
            if token == "EI" {
                in_inline_image = false;
            }
            continue;
        }
        if token == "ID" {
            in_inline_image = true;
        }
        filtered.push(token);
    }
    filtered
}

/// Parse a transformation matrix from a dictionary's /Matrix entry
fn parse_matrix_from_dict(dict: &Dictionary) -> Matrix {
    match dict.get(b"Matrix") {
        Ok(Object::Array(arr)) if arr.len() >= 6 => {
            let values: Option<Vec<f32>> = arr[..6].iter().map(number_of).collect();
            match values {
                Some(v) => Matrix {
                    a: v[0],
                    b: v[1],
                    c: v[2],
                    d: v[3],
                    e: v[4],
                    f: v[5],
                },
                None => Matrix::identity(),
            }
        }
        _ => Matrix::identity(),
    }
}

/// Records image placements while walking content streams.
pub(crate) struct ContentScanner<'a> {
    doc: &'a Document,
    placements: Vec<ImagePlacement>,
    /// Forms currently being scanned (guards against cycles)
    active_forms: HashSet<ObjectId>,
}

impl<'a> ContentScanner<'a> {
    pub fn new(doc: &'a Document) -> Self {
        ContentScanner {
            doc,
            placements: Vec::new(),
            active_forms: HashSet::new(),
        }
    }

    /// Scan one page and return its image placements in paint order.
    pub fn scan_page(mut self, page_dict: &Dictionary) -> Vec<ImagePlacement> {
        let resources = inherited_attribute(self.doc, page_dict, b"Resources")
            .cloned()
            .unwrap_or(Object::Null);

        if let Ok(contents) = page_dict.get(b"Contents") {
            let content = content_data(self.doc, contents);
            self.scan_content_stream(&content, &resources, Matrix::identity());
        }

        self.placements
    }

    fn scan_content_stream(&mut self, content: &[u8], resources: &Object, initial_matrix: Matrix) {
        let xobjects = xobjects_in(self.doc, resources);
        let tokens = tokenize(content);

        // Graphics state stack
        let mut matrix_stack: Vec<Matrix> = vec![initial_matrix];

        for (i, token) in tokens.iter().enumerate() {
            match token.as_str() {
                "q" => {
                    if let Some(current) = matrix_stack.last() {
                        matrix_stack.push(*current);
                    }
                }
                "Q" => {
                    if matrix_stack.len() > 1 {
                        matrix_stack.pop();
                    }
                }
                "cm" if i >= 6 => {
                    let operands: Option<Vec<f32>> = tokens[i - 6..i]
                        .iter()
                        .map(|t| t.parse::<f32>().ok())
                        .collect();
                    if let Some(v) = operands {
                        let new_matrix = Matrix {
                            a: v[0],
                            b: v[1],
                            c: v[2],
                            d: v[3],
                            e: v[4],
                            f: v[5],
                        };
                        if let Some(current) = matrix_stack.last_mut() {
                            *current = new_matrix.concat(current);
                        }
                    }
                }
                "Do" if i >= 1 => {
                    let name = tokens[i - 1].trim_start_matches('/');
                    let Some(&(_, obj_id)) = xobjects.iter().find(|(n, _)| n == name) else {
                        continue;
                    };
                    let current_matrix = matrix_stack.last().copied().unwrap_or(Matrix::identity());
                    self.paint_xobject(obj_id, current_matrix, resources);
                }
                _ => {}
            }
        }
    }

    fn paint_xobject(&mut self, obj_id: ObjectId, current_matrix: Matrix, resources: &Object) {
        let subtype = match self.doc.get_object(obj_id) {
            Ok(Object::Stream(stream)) => name_of(&stream.dict, b"Subtype"),
            _ => None,
        };

        match subtype.as_deref() {
            Some("Image") => self.placements.push(ImagePlacement {
                object_id: obj_id,
                matrix: current_matrix,
            }),
            Some("Form") => self.scan_form_xobject(obj_id, current_matrix, resources),
            _ => {}
        }
    }

    /// Scan a Form XObject's content stream. A form without `/Resources`
    /// uses the resources of the stream that painted it.
    fn scan_form_xobject(&mut self, form_id: ObjectId, parent_matrix: Matrix, parent_resources: &Object) {
        if self.active_forms.len() >= MAX_FORM_DEPTH || !self.active_forms.insert(form_id) {
            return;
        }

        let doc = self.doc;
        if let Ok(Object::Stream(stream)) = doc.get_object(form_id) {
            let form_matrix = parse_matrix_from_dict(&stream.dict);
            let combined_matrix = form_matrix.concat(&parent_matrix);
            let resources = stream
                .dict
                .get(b"Resources")
                .unwrap_or(parent_resources)
                .clone();
            let content = decompress_stream(stream);
            self.scan_content_stream(&content, &resources, combined_matrix);
        }

        self.active_forms.remove(&form_id);
    }
}
