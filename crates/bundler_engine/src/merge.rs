//! Merge stage: plan balanced groups, then concatenate each group's pages.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use bundler_core::{merged_file_name, plan_merge, MergeGroup, MergeSummary, PlanInput};
use engine_logging::{engine_debug, engine_info, engine_warn};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use crate::inputs::scan_pdfs;
use crate::persist::{ensure_output_dir, StagedFile};
use crate::StageError;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("cannot read {path}: {message}")]
    Load { path: PathBuf, message: String },
    #[error("no pages to merge")]
    Empty,
    #[error("cannot write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

impl MergeError {
    fn load(path: &Path, message: impl ToString) -> Self {
        MergeError::Load {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    fn write(path: &Path, message: impl ToString) -> Self {
        MergeError::Write {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

pub fn page_count(path: &Path) -> Result<usize, MergeError> {
    let doc = Document::load(path).map_err(|err| MergeError::load(path, err))?;
    Ok(doc.get_pages().len())
}

/// Concatenate the pages of `inputs`, in order, into `output`.
///
/// Nothing appears at `output` unless every input was read and the merged
/// document was fully written. Returns the number of pages written.
pub fn concatenate<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<usize, MergeError> {
    let mut document = assemble(inputs)?;
    let pages = document.get_pages().len();

    let staged = StagedFile::new(output).map_err(|err| MergeError::write(output, err))?;
    {
        let file = File::create(staged.path()).map_err(|err| MergeError::write(output, err))?;
        let mut writer = BufWriter::new(file);
        document
            .save_to(&mut writer)
            .map_err(|err| MergeError::write(output, err))?;
        writer.flush().map_err(|err| MergeError::write(output, err))?;
    }
    staged.commit().map_err(|err| MergeError::write(output, err))?;
    Ok(pages)
}

fn assemble<P: AsRef<Path>>(inputs: &[P]) -> Result<Document, MergeError> {
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for input in inputs {
        let path = input.as_ref();
        let mut doc = Document::load(path).map_err(|err| MergeError::load(path, err))?;
        inherit_page_attributes(&mut doc);
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(MergeError::load(path, "document has no pages"));
        }
        for page_id in page_ids {
            let page = doc
                .get_object(page_id)
                .map_err(|err| MergeError::load(path, err))?
                .clone();
            pages.push((page_id, page));
        }
        objects.extend(doc.objects);
    }

    if pages.is_empty() {
        return Err(MergeError::Empty);
    }

    let mut document = Document::with_version("1.5");
    for (id, object) in objects {
        match type_name(&object) {
            Some(b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline") => {}
            _ => {
                document.objects.insert(id, object);
            }
        }
    }

    let pages_id: ObjectId = (next_id, 0);
    let catalog_id: ObjectId = (next_id + 1, 0);
    document.max_id = next_id + 1;

    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    for (id, mut page) in pages {
        if let Object::Dictionary(dict) = &mut page {
            dict.set("Parent", pages_id);
        }
        document.objects.insert(id, page);
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    document.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    document.trailer.set("Root", catalog_id);

    document.renumber_objects();
    document.compress();
    Ok(document)
}

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Copy attributes a page only inherits from the source page tree onto the
/// page itself; the tree is replaced when documents are merged.
fn inherit_page_attributes(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        let inherited: Vec<(&[u8], Object)> = match doc.get_dictionary(page_id) {
            Ok(page) => INHERITABLE
                .iter()
                .filter(|key| !page.has(key))
                .filter_map(|key| find_inherited(doc, page, key).map(|value| (*key, value)))
                .collect(),
            Err(_) => continue,
        };
        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in inherited {
                page.set(key.to_vec(), value);
            }
        }
    }
}

fn find_inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    // Bounded walk; malformed trees can contain cycles.
    for _ in 0..64 {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Merge every PDF in `input_dir` into at most `count` balanced files in
/// `output_dir`. A group that fails is logged and skipped; the others are
/// still written.
pub fn merge_directory(
    input_dir: &Path,
    output_dir: &Path,
    count: NonZeroUsize,
) -> Result<MergeSummary, StageError> {
    let found = scan_pdfs(input_dir)?;
    let mut inputs: Vec<PlanInput> = Vec::with_capacity(found.len());
    for pdf in &found {
        match pdf.to_plan_input() {
            Some(input) if input.size > 0 => inputs.push(input),
            _ => engine_warn!("Ignoring empty file {:?}", pdf.path()),
        }
    }
    engine_info!(
        "Found {} PDF files in {} ({} usable)",
        found.len(),
        input_dir.display(),
        inputs.len()
    );

    let mut summary = MergeSummary {
        inputs: inputs.len(),
        ..MergeSummary::default()
    };
    if inputs.is_empty() {
        return Ok(summary);
    }

    ensure_output_dir(output_dir)?;
    let plan = plan_merge(inputs, count);
    summary.groups_planned = plan.len();
    engine_info!("Will create {} merged PDF files", plan.len());

    for (index, group) in plan.groups().iter().enumerate() {
        let output = output_dir.join(merged_file_name(index));
        match write_group(group, &output) {
            Ok(pages) => {
                summary.written += 1;
                summary.pages += pages;
            }
            Err(err) => {
                summary.failed += 1;
                engine_warn!("Skipping {}: {}", output.display(), err);
            }
        }
    }

    engine_info!(
        "Created {} merged PDF files in {} ({} failed)",
        summary.written,
        output_dir.display(),
        summary.failed
    );
    Ok(summary)
}

fn write_group(group: &MergeGroup, output: &Path) -> Result<usize, MergeError> {
    let paths: Vec<&Path> = group.paths().collect();
    let pages = concatenate(&paths, output)?;
    engine_debug!(
        "Created {} from {} PDFs ({} pages, {} input bytes)",
        output.display(),
        group.len(),
        pages,
        group.total_bytes()
    );
    Ok(pages)
}
