//! Whole-volume scandisk behavior, exercised against synthetically built
//! in-memory images rather than unit-level FAT/directory primitives.
//! Mirrors spec.md §8's concrete scenario 6 ("scandisk full-trip").

use chrono::{NaiveDate, NaiveDateTime};

use fat32::fat::{Fat, FatEntry};
use fat32::geometry::{BootSector, FsInfo, Geometry};
use fat32::image::Image;
use fat32::scandisk::ScandiskOptions;
use fat32::testutil::{build_image, ImageSpec, MemStore};
use fat32::Tree;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(9, 30, 0).unwrap()
}

fn open() -> (Image<MemStore>, Geometry, Fat, FsInfo) {
    let spec = ImageSpec { total_clusters: 256, ..ImageSpec::default() };
    let img = Image::new(MemStore::from_vec(build_image(&spec)));
    let bs = BootSector::read_at(&img, 0).unwrap();
    let geom = Geometry::from_boot_sector(&bs).unwrap();
    let fat = Fat::new(geom);
    let fsinfo = FsInfo::read_at(&img, geom.fsinfo_offset()).unwrap();
    (img, geom, fat, fsinfo)
}

/// A volume with: (a) a file whose declared size exceeds its chain
/// capacity, (b) two files sharing a tail cluster, and (c) an allocated but
/// unreferenced chain. After running all three passes, a second pass
/// reports zero errors and the tree still resolves every legitimate file.
#[test]
fn full_scandisk_trip_converges_and_preserves_the_tree() {
    let _ = env_logger::try_init();
    let (mut img, geom, fat, mut fsinfo) = open();
    let mut tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
    let root = tree.root();

    let content = vec![0x5Au8; geom.cluster_size as usize * 2];
    let victim = tree.create_file(&mut img, &fat, &mut fsinfo, &geom, root, "victim.bin", now(), &content).unwrap();
    let sharer = tree.create_file(&mut img, &fat, &mut fsinfo, &geom, root, "sharer.bin", now(), &content).unwrap();
    let oversized =
        tree.create_file(&mut img, &fat, &mut fsinfo, &geom, root, "oversized.txt", now(), b"short").unwrap();

    // (a) declare a size far larger than the one-cluster chain can hold.
    let (dir_cluster, slot_offset) = tree.get(oversized).entry_location.unwrap();
    fat32::File::patch_entry(&mut img, &fat, &geom, dir_cluster, slot_offset, Some(999_999), None).unwrap();
    tree.get_mut(oversized).size_bytes = 999_999;

    // (b) force victim's tail cluster onto sharer's tail cluster.
    let sharer_chain: Vec<u32> = fat.walk(&img, tree.get(sharer).first_cluster).map(|c| c.unwrap()).collect();
    let victim_first = tree.get(victim).first_cluster;
    fat.set(&mut img, victim_first, sharer_chain[1]).unwrap();

    // (c) allocate a cluster with no directory entry pointing at it.
    let orphan = fat.find_free(&img, &mut fsinfo, 1).unwrap()[0];
    fat.set_eoc(&mut img, orphan).unwrap();
    img.write_flush(geom.fsinfo_offset(), fsinfo.raw()).unwrap();

    let options = ScandiskOptions { basic: true, lost_clusters: true, intersections: true, size_check: true };
    let first_report = fat32::scandisk::run(&mut img, &fat, &mut fsinfo, &geom, &mut tree, &options).unwrap();
    assert_eq!(first_report.size_check.errors_repaired, 1);
    assert_eq!(first_report.intersections.errors_repaired, 1);
    assert_eq!(first_report.lost_clusters.errors_repaired, 1);

    assert_eq!(fat.get(&img, orphan).unwrap(), FatEntry::Free);

    // sharer's content must survive untouched.
    assert_eq!(tree.read_file(&img, &fat, sharer).unwrap(), content);
    assert_eq!(tree.read_file(&img, &fat, victim).unwrap(), content);
    assert_eq!(tree.get(oversized).size_bytes, geom.cluster_size);

    let mut reloaded = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
    let second_report =
        fat32::scandisk::run(&mut img, &fat, &mut fsinfo, &geom, &mut reloaded, &options).unwrap();
    assert!(!second_report.has_errors());
}

#[test]
fn scandisk_is_idempotent_on_an_already_clean_volume() {
    let (mut img, geom, fat, mut fsinfo) = open();
    let mut tree = Tree::load(&img, &fat, geom.root_first_cluster, 128).unwrap();
    let root = tree.root();
    tree.create_file(&mut img, &fat, &mut fsinfo, &geom, root, "plain.txt", now(), b"just a file").unwrap();

    let options = ScandiskOptions { lost_clusters: true, intersections: true, size_check: true, basic: true };
    let first = fat32::scandisk::run(&mut img, &fat, &mut fsinfo, &geom, &mut tree, &options).unwrap();
    assert!(!first.has_errors());

    let second = fat32::scandisk::run(&mut img, &fat, &mut fsinfo, &geom, &mut tree, &options).unwrap();
    assert_eq!(second.size_check, fat32::PassCounters::default());
    assert_eq!(second.intersections, fat32::PassCounters::default());
    assert_eq!(second.lost_clusters, fat32::PassCounters::default());
}
