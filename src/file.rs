//! L4 (part 2): the file/directory tree.
//!
//! Grounded in `original_source/dirbrowser.py` (path resolution, the
//! invalid-character list, `.`/`..` handling) and `fat_editor.py`
//! (`_find_dir_empty_entries`, `append_cluster_to_file`,
//! `_find_free_clusters`, `write_to_image` — the write path). Per
//! SPEC_FULL.md §9, the tree is an arena (`Vec<File>` indexed by
//! [`FileId`]) rather than `Rc<RefCell<..>>`, so a child can cheaply carry
//! its parent without a reference cycle, and traversal during decode is an
//! explicit stack rather than recursion so a corrupt image can't blow the
//! call stack.

use chrono::{NaiveDate, NaiveDateTime};

use crate::direntry::{self, ShortEntry, ShortEntrySpec};
use crate::error::{Error, Result};
use crate::fat::Fat;
use crate::geometry::{FsInfo, Geometry};
use crate::image::{Image, Store};

/// Characters `original_source/dirbrowser.py` rejects outright in a path
/// component: `< > : " / \ | ? *`.
const INVALID_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidName(name.chars().next().unwrap_or('\0')));
    }
    if let Some(c) = name.chars().find(|c| INVALID_NAME_CHARS.contains(c) || c.is_control()) {
        return Err(Error::InvalidName(c));
    }
    Ok(())
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1980, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

/// Index into a [`Tree`]'s arena. Cheap to copy, stable for the tree's
/// lifetime (nodes are never removed, only appended).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(usize);

/// One file or directory. The root directory is always `FileId` `0` and
/// has no name of its own (`short_name` is empty, `parent` is `None`).
#[derive(Debug, Clone)]
pub struct File {
    pub short_name: String,
    pub long_name: Option<String>,
    pub attributes: u8,
    pub create_datetime: NaiveDateTime,
    pub last_access_date: NaiveDate,
    pub change_datetime: NaiveDateTime,
    pub size_bytes: u32,
    pub first_cluster: u32,
    pub parent: Option<FileId>,
    pub children: Vec<FileId>,
    /// `(directory's first cluster, byte offset of this entry within that
    /// directory's flattened chain content)` — `None` for the synthetic
    /// root node, which has no directory entry of its own. Lets
    /// [`crate::scandisk`] patch a `size`/`first_cluster` field in place.
    pub entry_location: Option<(u32, usize)>,
}

impl File {
    pub fn is_directory(&self) -> bool {
        self.attributes & direntry::ATTR_DIRECTORY != 0
    }

    /// The long name if one was stored, else the short name — spec §4.4's
    /// "the name a user sees" rule.
    pub fn display_name(&self) -> &str {
        self.long_name.as_deref().unwrap_or(&self.short_name)
    }
}

fn combine_short_name(short: &ShortEntry) -> String {
    if short.attributes & direntry::ATTR_DIRECTORY != 0 || short.ext.is_empty() {
        short.name.clone()
    } else {
        format!("{}.{}", short.name, short.ext)
    }
}

/// The decoded file/directory tree for one volume.
pub struct Tree {
    nodes: Vec<File>,
    pub volume_label: Option<String>,
}

fn read_chain_bytes<S: Store>(image: &Image<S>, fat: &Fat, start: u32) -> Result<Vec<u8>> {
    if start < 2 {
        return Ok(Vec::new());
    }
    let mut buf = Vec::new();
    for cluster in fat.walk(image, start) {
        let cluster = cluster?;
        let range = fat.geometry.cluster_byte_range(cluster);
        let mut chunk = vec![0u8; (range.end - range.start) as usize];
        image.read_into(range.start, &mut chunk)?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn cluster_list<S: Store>(image: &Image<S>, fat: &Fat, start: u32) -> Result<Vec<u32>> {
    fat.walk(image, start).collect()
}

impl Tree {
    pub fn root(&self) -> FileId {
        FileId(0)
    }

    pub fn get(&self, id: FileId) -> &File {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: FileId) -> &mut File {
        &mut self.nodes[id.0]
    }

    /// Every node in the tree, root included, in arena order. Used by
    /// [`crate::scandisk`] to walk every file without re-deriving the
    /// parent/child structure.
    pub fn ids(&self) -> impl Iterator<Item = FileId> + '_ {
        (0..self.nodes.len()).map(FileId)
    }

    /// Decodes the whole tree starting at `root_cluster`, iteratively and
    /// breadth-first, refusing to nest deeper than `max_depth` (spec §4.4 /
    /// SPEC_FULL.md's `VolumeOptions::max_directory_depth`).
    pub fn load<S: Store>(image: &Image<S>, fat: &Fat, root_cluster: u32, max_depth: u32) -> Result<Tree> {
        let mut nodes = vec![File {
            short_name: String::new(),
            long_name: None,
            attributes: direntry::ATTR_DIRECTORY,
            create_datetime: epoch(),
            last_access_date: epoch().date(),
            change_datetime: epoch(),
            size_bytes: 0,
            first_cluster: root_cluster,
            parent: None,
            children: Vec::new(),
            entry_location: None,
        }];
        let mut volume_label = None;

        let mut stack = vec![(FileId(0), root_cluster, 0u32)];
        while let Some((dir_id, cluster, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(Error::MaxDepthExceeded(max_depth));
            }
            let data = read_chain_bytes(image, fat, cluster)?;
            let decoded = direntry::decode_directory(&data);
            if dir_id == FileId(0) && decoded.volume_label.is_some() {
                volume_label = decoded.volume_label;
            }

            for (short, long_name, slot_offset) in decoded.entries {
                if short.attributes & direntry::ATTR_VOLUME_ID != 0 {
                    continue;
                }
                let combined = combine_short_name(&short);
                if combined == "." || combined == ".." {
                    continue;
                }
                let is_dir = short.attributes & direntry::ATTR_DIRECTORY != 0;
                let id = FileId(nodes.len());
                nodes.push(File {
                    short_name: combined,
                    long_name,
                    attributes: short.attributes,
                    create_datetime: short.create_datetime.unwrap_or_else(epoch),
                    last_access_date: short.last_access_date.unwrap_or_else(|| epoch().date()),
                    change_datetime: short.change_datetime.unwrap_or_else(epoch),
                    size_bytes: short.size_bytes,
                    first_cluster: short.first_cluster,
                    parent: Some(dir_id),
                    children: Vec::new(),
                    entry_location: Some((cluster, slot_offset)),
                });
                nodes[dir_id.0].children.push(id);
                if is_dir && short.first_cluster >= 2 {
                    stack.push((id, short.first_cluster, depth + 1));
                }
            }
        }

        Ok(Tree { nodes, volume_label })
    }

    fn find_child(&self, dir: FileId, name: &str) -> Option<FileId> {
        self.nodes[dir.0].children.iter().copied().find(|&id| {
            let f = &self.nodes[id.0];
            f.short_name.eq_ignore_ascii_case(name)
                || f.long_name.as_deref().map(|n| n.eq_ignore_ascii_case(name)).unwrap_or(false)
        })
    }

    /// Resolves a `/`-separated path from the root, with `.`/`..`
    /// components, the way `original_source/dirbrowser.py::find` does.
    pub fn resolve(&self, path: &str) -> Result<FileId> {
        let mut cur = self.root();
        for seg in path.split(['/', '\\']).filter(|s| !s.is_empty()) {
            if seg == "." {
                continue;
            }
            if seg == ".." {
                cur = self.nodes[cur.0].parent.unwrap_or(self.root());
                continue;
            }
            cur = self.find_child(cur, seg).ok_or_else(|| Error::NotFound(path.to_string()))?;
        }
        Ok(cur)
    }

    /// The directory entries of `dir`, erroring if it isn't a directory.
    pub fn children(&self, dir: FileId) -> Result<&[FileId]> {
        let f = &self.nodes[dir.0];
        if !f.is_directory() {
            return Err(Error::NotADirectory(f.display_name().to_string()));
        }
        Ok(&f.children)
    }

    /// Reads a regular file's content, truncated to its recorded size.
    pub fn read_file<S: Store>(&self, image: &Image<S>, fat: &Fat, id: FileId) -> Result<Vec<u8>> {
        let f = &self.nodes[id.0];
        if f.is_directory() {
            return Err(Error::IsADirectory(f.display_name().to_string()));
        }
        if f.size_bytes == 0 || f.first_cluster < 2 {
            return Ok(Vec::new());
        }
        let mut data = read_chain_bytes(image, fat, f.first_cluster)?;
        data.truncate(f.size_bytes as usize);
        Ok(data)
    }

    fn existing_short_names(&self, dir: FileId) -> Vec<String> {
        self.nodes[dir.0].children.iter().map(|&id| self.nodes[id.0].short_name.clone()).collect()
    }

    /// Builds the on-disk entries (LFN parts, if needed, followed by the
    /// short entry) for a new child, per spec §4.4's encode algorithm.
    fn build_entries(
        &self,
        dir: FileId,
        name: &str,
        attributes: u8,
        now: NaiveDateTime,
        size_bytes: u32,
        first_cluster: u32,
    ) -> Result<(Vec<[u8; direntry::ENTRY_SIZE]>, String)> {
        let existing = self.existing_short_names(dir);
        let short_display = crate::shortname::generate(name, &existing)?;
        let (short_name, short_ext) = crate::shortname::split_display(&short_display);

        let spec = ShortEntrySpec {
            name: short_name,
            ext: short_ext,
            attributes,
            create_datetime: now,
            last_access_date: now.date(),
            change_datetime: now,
            size_bytes,
            first_cluster,
        };
        let short_bytes = direntry::encode_short_entry(&spec)?;

        let mut entries = Vec::new();
        if short_display != name {
            let name11 = direntry::pack_name11(short_name, short_ext)?;
            let checksum = crate::shortname::checksum(&name11);
            entries.extend(direntry::encode_lfn_parts(name, checksum));
        }
        entries.push(short_bytes);
        Ok((entries, short_display))
    }

    /// Finds `needed` contiguous free slots in `dir`'s directory content,
    /// extending the chain (grounded in
    /// `fat_editor.py::_find_dir_empty_entries`/`append_cluster_to_file`) by
    /// as many new clusters as it takes to hold the shortfall if none exist,
    /// and writes `entries` there. Returns the new child's arena slot is
    /// left to the caller; this only touches on-disk state.
    fn place_entries<S: Store>(
        &self,
        image: &mut Image<S>,
        fat: &Fat,
        fsinfo: &mut FsInfo,
        geometry: &Geometry,
        dir_first_cluster: u32,
        entries: &[[u8; direntry::ENTRY_SIZE]],
    ) -> Result<usize> {
        let mut clusters = cluster_list(image, fat, dir_first_cluster)?;
        let mut buf = read_chain_bytes(image, fat, dir_first_cluster)?;
        let needed = entries.len();

        let mut run_start: Option<usize> = None;
        let mut run_len = 0usize;
        let mut found = None;
        for (idx, chunk) in buf.chunks_exact(direntry::ENTRY_SIZE).enumerate() {
            let free = chunk[0] == 0x00 || chunk[0] == 0xE5;
            if free {
                if run_start.is_none() {
                    run_start = Some(idx);
                }
                run_len += 1;
                if run_len >= needed {
                    found = run_start;
                    break;
                }
            } else {
                run_start = None;
                run_len = 0;
            }
        }

        let offset = match found {
            Some(idx) => idx * direntry::ENTRY_SIZE,
            None => {
                // No existing run covers `needed` slots. `run_start`/`run_len`
                // (if set) describe a free run trailing off the end of the
                // last cluster — reuse it and cover only the shortfall with
                // fresh clusters, linking as many as it takes (spec §4.4:
                // "extend it by allocating and linking new zero-filled
                // clusters").
                let trailing = run_len;
                let offset = match run_start {
                    Some(idx) => idx * direntry::ENTRY_SIZE,
                    None => buf.len(),
                };
                let remaining = needed - trailing;
                let slots_per_cluster = geometry.cluster_size as usize / direntry::ENTRY_SIZE;
                let new_cluster_count = remaining.div_ceil(slots_per_cluster);

                let new_clusters = fat.find_free(image, fsinfo, new_cluster_count)?;
                let mut last = *clusters.last().expect("directory always has >= 1 cluster");
                for &c in &new_clusters {
                    fat.set(image, last, c)?;
                    last = c;
                }
                fat.set_eoc(image, last)?;

                buf.resize(buf.len() + new_cluster_count * geometry.cluster_size as usize, 0u8);
                clusters.extend(new_clusters);
                offset
            }
        };

        for (i, entry) in entries.iter().enumerate() {
            let at = offset + i * direntry::ENTRY_SIZE;
            buf[at..at + direntry::ENTRY_SIZE].copy_from_slice(entry);
        }

        let cluster_size = geometry.cluster_size as usize;
        for (i, &c) in clusters.iter().enumerate() {
            let range = geometry.cluster_byte_range(c);
            image.write(range.start, &buf[i * cluster_size..(i + 1) * cluster_size])?;
        }
        image.write_flush(geometry.fsinfo_offset(), fsinfo.raw())?;
        // The short entry is always the last of the entries just written —
        // LFN parts (if any) precede it in on-disk order.
        Ok(offset + (entries.len() - 1) * direntry::ENTRY_SIZE)
    }

    /// Allocates a contiguous-in-the-FAT-sense (but not necessarily
    /// contiguous-on-disk) cluster chain for `content`, writes it, and
    /// returns the first cluster (`0` for empty content).
    fn write_content<S: Store>(
        &self,
        image: &mut Image<S>,
        fat: &Fat,
        fsinfo: &mut FsInfo,
        geometry: &Geometry,
        content: &[u8],
    ) -> Result<u32> {
        if content.is_empty() {
            return Ok(0);
        }
        let cluster_size = geometry.cluster_size as usize;
        let n = content.len().div_ceil(cluster_size);
        let clusters = fat.find_free(image, fsinfo, n)?;
        for w in clusters.windows(2) {
            fat.set(image, w[0], w[1])?;
        }
        fat.set_eoc(image, *clusters.last().unwrap())?;

        for (i, &c) in clusters.iter().enumerate() {
            let range = geometry.cluster_byte_range(c);
            let start = i * cluster_size;
            let end = (start + cluster_size).min(content.len());
            let mut chunk = vec![0u8; cluster_size];
            chunk[..end - start].copy_from_slice(&content[start..end]);
            image.write(range.start, &chunk)?;
        }
        image.write_flush(geometry.fsinfo_offset(), fsinfo.raw())?;
        Ok(clusters[0])
    }

    /// Creates a regular file as a child of `dir`, writing its content and
    /// directory entry (grounded in `fat_editor.py::write_to_image`).
    pub fn create_file<S: Store>(
        &mut self,
        image: &mut Image<S>,
        fat: &Fat,
        fsinfo: &mut FsInfo,
        geometry: &Geometry,
        dir: FileId,
        name: &str,
        now: NaiveDateTime,
        content: &[u8],
    ) -> Result<FileId> {
        validate_name(name)?;
        if !self.nodes[dir.0].is_directory() {
            return Err(Error::NotADirectory(self.nodes[dir.0].display_name().to_string()));
        }

        let first_cluster = self.write_content(image, fat, fsinfo, geometry, content)?;
        let (entries, short_display) =
            self.build_entries(dir, name, direntry::ATTR_ARCHIVE, now, content.len() as u32, first_cluster)?;
        let dir_first_cluster = self.nodes[dir.0].first_cluster;
        let slot_offset =
            self.place_entries(image, fat, fsinfo, geometry, dir_first_cluster, &entries)?;

        let long_name = if short_display != name { Some(name.to_string()) } else { None };
        let id = FileId(self.nodes.len());
        self.nodes.push(File {
            short_name: short_display,
            long_name,
            attributes: direntry::ATTR_ARCHIVE,
            create_datetime: now,
            last_access_date: now.date(),
            change_datetime: now,
            size_bytes: content.len() as u32,
            first_cluster,
            parent: Some(dir),
            children: Vec::new(),
            entry_location: Some((dir_first_cluster, slot_offset)),
        });
        self.nodes[dir.0].children.push(id);
        Ok(id)
    }

    /// Creates a subdirectory of `dir`, synthesizing its `.`/`..` entries
    /// into the single cluster it starts with.
    pub fn create_directory<S: Store>(
        &mut self,
        image: &mut Image<S>,
        fat: &Fat,
        fsinfo: &mut FsInfo,
        geometry: &Geometry,
        dir: FileId,
        name: &str,
        now: NaiveDateTime,
    ) -> Result<FileId> {
        validate_name(name)?;
        if !self.nodes[dir.0].is_directory() {
            return Err(Error::NotADirectory(self.nodes[dir.0].display_name().to_string()));
        }

        let new_cluster = fat.find_free(image, fsinfo, 1)?[0];
        fat.set_eoc(image, new_cluster)?;
        image.write_flush(geometry.fsinfo_offset(), fsinfo.raw())?;

        let parent_cluster = self.nodes[dir.0].first_cluster;
        let dot = direntry::encode_short_entry(&ShortEntrySpec {
            name: ".",
            ext: "",
            attributes: direntry::ATTR_DIRECTORY,
            create_datetime: now,
            last_access_date: now.date(),
            change_datetime: now,
            size_bytes: 0,
            first_cluster: new_cluster,
        })?;
        let dotdot = direntry::encode_short_entry(&ShortEntrySpec {
            name: "..",
            ext: "",
            attributes: direntry::ATTR_DIRECTORY,
            create_datetime: now,
            last_access_date: now.date(),
            change_datetime: now,
            size_bytes: 0,
            // root's ".." conventionally points back at cluster 0, not its
            // own first cluster — spec.md §4.4's dot-entry rule.
            first_cluster: if dir == self.root() { 0 } else { parent_cluster },
        })?;
        let range = geometry.cluster_byte_range(new_cluster);
        let mut cluster_buf = vec![0u8; geometry.cluster_size as usize];
        cluster_buf[0..32].copy_from_slice(&dot);
        cluster_buf[32..64].copy_from_slice(&dotdot);
        image.write(range.start, &cluster_buf)?;
        image.flush()?;

        let (entries, short_display) =
            self.build_entries(dir, name, direntry::ATTR_DIRECTORY, now, 0, new_cluster)?;
        let slot_offset =
            self.place_entries(image, fat, fsinfo, geometry, parent_cluster, &entries)?;

        let long_name = if short_display != name { Some(name.to_string()) } else { None };
        let id = FileId(self.nodes.len());
        self.nodes.push(File {
            short_name: short_display,
            long_name,
            attributes: direntry::ATTR_DIRECTORY,
            create_datetime: now,
            last_access_date: now.date(),
            change_datetime: now,
            size_bytes: 0,
            first_cluster: new_cluster,
            parent: Some(dir),
            children: Vec::new(),
            entry_location: Some((parent_cluster, slot_offset)),
        });
        self.nodes[dir.0].children.push(id);
        Ok(id)
    }
}

impl File {
    /// Patches the on-disk standard entry's `size`/`first_cluster` fields in
    /// place, for [`crate::scandisk`]'s Pass A/B repairs. `dir_first_cluster`
    /// and `slot_offset` come from [`File::entry_location`].
    pub fn patch_entry<S: Store>(
        image: &mut Image<S>,
        fat: &Fat,
        geometry: &Geometry,
        dir_first_cluster: u32,
        slot_offset: usize,
        size_bytes: Option<u32>,
        first_cluster: Option<u32>,
    ) -> Result<()> {
        let cluster_size = geometry.cluster_size as usize;
        let cluster_idx = slot_offset / cluster_size;
        let within = slot_offset % cluster_size;

        let target_cluster = fat
            .walk(image, dir_first_cluster)
            .nth(cluster_idx)
            .ok_or_else(|| Error::NotFound(format!("directory cluster index {cluster_idx}")))??;
        let range = geometry.cluster_byte_range(target_cluster);
        let mut cluster_buf = vec![0u8; cluster_size];
        image.read_into(range.start, &mut cluster_buf)?;

        if let Some(size) = size_bytes {
            cluster_buf[within + 28..within + 32].copy_from_slice(&size.to_le_bytes());
        }
        if let Some(cluster) = first_cluster {
            let hi = ((cluster >> 16) & 0xFFFF) as u16;
            let lo = (cluster & 0xFFFF) as u16;
            cluster_buf[within + 20..within + 22].copy_from_slice(&hi.to_le_bytes());
            cluster_buf[within + 26..within + 28].copy_from_slice(&lo.to_le_bytes());
        }

        image.write_flush(range.start, &cluster_buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BootSector;
    use crate::testutil::{build_image, ImageSpec, MemStore};

    fn open() -> (Image<MemStore>, Geometry, Fat, FsInfo) {
        let spec = ImageSpec::default();
        let img = Image::new(MemStore::from_vec(build_image(&spec)));
        let bs = BootSector::read_at(&img, 0).unwrap();
        let geom = Geometry::from_boot_sector(&bs).unwrap();
        let fat = Fat::new(geom);
        let fsinfo = FsInfo::read_at(&img, geom.fsinfo_offset()).unwrap();
        (img, geom, fat, fsinfo)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn loads_empty_root() {
        let (img, geom, fat, _) = open();
        let tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        assert_eq!(tree.children(tree.root()).unwrap().len(), 0);
    }

    #[test]
    fn create_and_read_back_a_short_ascii_file() {
        let (mut img, geom, fat, mut fsinfo) = open();
        let mut tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        let root = tree.root();
        let id = tree.create_file(&mut img, &fat, &mut fsinfo, &geom, root, "readme.txt", now(), b"hello world").unwrap();
        assert_eq!(tree.get(id).short_name, "README.TXT");
        assert_eq!(tree.read_file(&img, &fat, id).unwrap(), b"hello world");

        // reload from scratch to ensure the on-disk entry round-trips
        let reloaded = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        let reloaded_id = reloaded.resolve("README.TXT").unwrap();
        assert_eq!(reloaded.read_file(&img, &fat, reloaded_id).unwrap(), b"hello world");
    }

    #[test]
    fn create_file_with_long_name_round_trips_lfn() {
        let (mut img, geom, fat, mut fsinfo) = open();
        let mut tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        let root = tree.root();
        let long = "a file with spaces and stuff.txt";
        let id = tree.create_file(&mut img, &fat, &mut fsinfo, &geom, root, long, now(), b"data").unwrap();
        assert_eq!(tree.get(id).long_name.as_deref(), Some(long));

        let reloaded = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        let reloaded_id = reloaded.resolve(long).unwrap();
        assert_eq!(reloaded.get(reloaded_id).display_name(), long);
    }

    #[test]
    fn create_directory_synthesizes_dot_entries() {
        let (mut img, geom, fat, mut fsinfo) = open();
        let mut tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        let root = tree.root();
        let dir_id = tree.create_directory(&mut img, &fat, &mut fsinfo, &geom, root, "SUBDIR", now()).unwrap();
        assert!(tree.get(dir_id).is_directory());

        let data = read_chain_bytes(&img, &fat, tree.get(dir_id).first_cluster).unwrap();
        let decoded = direntry::decode_directory(&data[..64]); // only `.`/`..` written so far
        assert_eq!(decoded.entries.len(), 2);
    }

    #[test]
    fn resolve_rejects_unknown_path() {
        let (img, geom, fat, _) = open();
        let tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        assert!(matches!(tree.resolve("nope.txt"), Err(Error::NotFound(_))));
    }

    #[test]
    fn create_file_spanning_multiple_clusters() {
        let (mut img, geom, fat, mut fsinfo) = open();
        let mut tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        let root = tree.root();
        let content = vec![0x42u8; geom.cluster_size as usize * 2 + 10];
        let id = tree.create_file(&mut img, &fat, &mut fsinfo, &geom, root, "BIG.BIN", now(), &content).unwrap();
        assert_eq!(tree.read_file(&img, &fat, id).unwrap(), content);
    }

    #[test]
    fn create_file_rejects_invalid_characters() {
        let (mut img, geom, fat, mut fsinfo) = open();
        let mut tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
        let root = tree.root();
        let err = tree.create_file(&mut img, &fat, &mut fsinfo, &geom, root, "bad:name.txt", now(), b"").unwrap_err();
        assert!(matches!(err, Error::InvalidName(':')));
    }
}
