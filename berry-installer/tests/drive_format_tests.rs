use berry_hal::{FakeHal, Operation, SystemHal};
use berry_installer::config::InstallerConfig;
use berry_installer::system_installer::{SystemInstaller, BOOT_FSTYPE};
use berry_workflow::{DriveFormatter, Installer, ProvisioningRequest, SystemPaths};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use tempfile::tempdir;

fn system_partition_mounts(hal: &FakeHal) -> Vec<PathBuf> {
    hal.operations()
        .into_iter()
        .filter_map(|op| match op {
            Operation::Mount {
                device,
                fstype: Some(fstype),
                ..
            } if fstype == BOOT_FSTYPE => Some(device),
            _ => None,
        })
        .collect()
}

#[test]
fn boot_files_follow_the_reformatted_drive() {
    let root = tempdir().unwrap();
    let paths = SystemPaths::with_root(root.path());
    let size = paths.sys_class_block.join("sda");
    fs::create_dir_all(&size).unwrap();
    fs::write(size.join("size"), "62521344\n").unwrap();
    let boot = paths.cmdline_txt.parent().unwrap().to_path_buf();
    fs::create_dir_all(&boot).unwrap();
    fs::write(&paths.cmdline_txt, "quiet\n").unwrap();
    fs::write(&paths.config_txt, "gpu_mem=64\n").unwrap();
    fs::write(boot.join("kernel.img"), "kernel").unwrap();

    let hal = FakeHal::new();
    let shared: Arc<dyn SystemHal> = Arc::new(hal.clone());
    let mut config = InstallerConfig::default();
    config.storage.boot_mount = boot.clone();
    config.storage.data_mount = root.path().join("mnt");
    let dev_dir = paths.dev_dir.clone();
    let net = root.path().join("sys/class/net");

    let formatter = DriveFormatter::with_installer(
        ProvisioningRequest::new("sda", "sda1").initialize_data(true),
        paths.clone(),
        Arc::clone(&shared),
        |layout| -> Arc<dyn Installer> {
            Arc::new(SystemInstaller::with_roots(
                config,
                layout.system_partition.clone(),
                shared.clone(),
                &dev_dir,
                &net,
            ))
        },
    )
    .unwrap();
    assert_eq!(formatter.layout().boot_partition, "sda1");

    let (tx, _rx) = mpsc::channel();
    formatter.run(&tx).unwrap();

    let mounts = system_partition_mounts(&hal);
    assert_eq!(mounts.len(), 2);
    assert!(mounts.iter().all(|dev| *dev == paths.dev("sda1")), "{:?}", mounts);
    assert!(hal.has_operation(|op| matches!(
        op,
        Operation::Mount { device, fstype: None, .. } if *device == paths.dev("sda2")
    )));
    assert_eq!(fs::read_to_string(boot.join("kernel.img")).unwrap(), "kernel");
    assert_eq!(
        fs::read_to_string(&paths.cmdline_txt).unwrap(),
        "quiet datadev=sda2"
    );
}

#[test]
fn shared_card_stays_the_system_partition() {
    let root = tempdir().unwrap();
    let paths = SystemPaths::with_root(root.path());
    let hal: Arc<dyn SystemHal> = Arc::new(FakeHal::new());
    let config = InstallerConfig::default();

    let formatter = DriveFormatter::with_installer(
        ProvisioningRequest::new("sda", "mmcblk0p1"),
        paths,
        Arc::clone(&hal),
        |layout| -> Arc<dyn Installer> {
            assert_eq!(layout.system_partition, "mmcblk0p1");
            Arc::new(SystemInstaller::new(config, layout.system_partition.clone(), hal.clone()))
        },
    )
    .unwrap();
    assert!(!formatter.layout().reformat_boot);
}
