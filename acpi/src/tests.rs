//! In-kernel tests for ACPI discovery.
//!
//! Every suite runs against [`FakeMapper`] platforms from
//! [`crate::test_fixtures`], so the whole discovery pipeline is exercised
//! without firmware. The fatal paths (missing FADT, missing DSDT) panic by
//! contract and are deliberately not driven here.

use opal_abi::addr::PhysAddr;
use opal_lib::testing::TestResult;
use opal_lib::{assert_eq_test, assert_test, define_test_suite, fail, pass};

use crate::AcpiSubsystem;
use crate::fadt::FadtFlags;
use crate::power::reset_action;
use crate::rsdp::{self, RsdpInfo};
use crate::tables::RootTable;
use crate::test_fixtures::{
    FIXTURE_FADT, FIXTURE_HPET, FIXTURE_LEGACY_DSDT, FIXTURE_RESET_PORT, FIXTURE_RESET_VALUE,
    FIXTURE_SSDT1, FIXTURE_SSDT2, FIXTURE_X_DSDT, FIXTURE_XSDT, FadtSpec, FakeMapper, bda_image,
    fadt_image, rsdp_image, rsdt_image, sdt_image,
};

/// Revision-1 machine: RSDP in the legacy window pointing at an RSDT, FADT
/// with only the legacy DSDT pointer.
fn legacy_platform() -> FakeMapper {
    let mapper = FakeMapper::new();
    mapper.add_region(0, bda_image(0));
    mapper.add_region(0xE0000, rsdp_image(0, FIXTURE_XSDT as u32, 0));
    mapper.add_region(FIXTURE_XSDT, rsdt_image(&[FIXTURE_FADT as u32]));
    mapper.add_region(
        FIXTURE_FADT,
        fadt_image(&FadtSpec {
            revision: 1,
            dsdt: FIXTURE_LEGACY_DSDT as u32,
            x_dsdt: 0,
            reset_port: 0,
            reset_value: 0,
        }),
    );
    mapper.add_region(FIXTURE_LEGACY_DSDT, sdt_image(*b"DSDT"));
    mapper
}

pub fn test_rsdp_found_in_ebda() -> TestResult {
    let mapper = FakeMapper::new();
    // EBDA at segment 0x9FC0 = physical 0x9FC00, RSDP 0x20 bytes in. The
    // legacy-window copy must lose to it.
    mapper.add_region(0, bda_image(0x9FC0));
    mapper.add_region(0x9FC20, rsdp_image(2, 0, FIXTURE_XSDT));
    mapper.add_region(0xE0000, rsdp_image(2, 0, 0xDEAD_0000));

    let info = match rsdp::search(&mapper) {
        Some(info) => info,
        None => return fail!("no RSDP found"),
    };
    assert_eq_test!(info.base, PhysAddr::new(0x9FC20), "RSDP base");
    assert_eq_test!(info.xsdt_address, FIXTURE_XSDT, "EBDA copy not preferred");
    pass!()
}

pub fn test_rsdp_found_in_legacy_area() -> TestResult {
    let mapper = FakeMapper::new();
    mapper.add_region(0, bda_image(0));
    mapper.add_region(0xE5670, rsdp_image(2, 0, FIXTURE_XSDT));

    let info = match rsdp::search(&mapper) {
        Some(info) => info,
        None => return fail!("no RSDP found"),
    };
    assert_eq_test!(info.base, PhysAddr::new(0xE5670), "RSDP base");
    assert_eq_test!(info.revision, 2, "RSDP revision");
    pass!()
}

/// No RSDP anywhere: the subsystem comes up inoperable, every query is
/// empty, and nothing stays mapped.
pub fn test_missing_rsdp_disables_subsystem() -> TestResult {
    let mapper = FakeMapper::new();
    mapper.add_region(0, bda_image(0));

    let acpi = AcpiSubsystem::discover(&mapper);
    assert_test!(!acpi.is_operable(), "subsystem operable without RSDP");
    assert_test!(acpi.rsdp().is_none(), "rsdp present");
    assert_test!(acpi.root_table().is_none(), "root table present");
    assert_test!(acpi.find_table(b"HPET").is_none(), "find_table hit");
    assert_test!(acpi.fixed_data().is_none(), "fixed data present");
    assert_test!(acpi.aml_tables().is_empty(), "AML tables present");
    assert_eq_test!(mapper.outstanding(), 0, "windows leaked");
    pass!()
}

pub fn test_root_table_revision_zero_selects_rsdt() -> TestResult {
    let info = RsdpInfo {
        base: PhysAddr::new(0xE0000),
        revision: 0,
        rsdt_address: 0x8_0000,
        xsdt_address: 0x9_0000,
    };
    assert_eq_test!(
        RootTable::select(&info),
        RootTable::Rsdt {
            base: PhysAddr::new(0x8_0000)
        },
        "root table kind"
    );
    pass!()
}

pub fn test_root_table_revision_two_selects_xsdt() -> TestResult {
    let info = RsdpInfo {
        base: PhysAddr::new(0xE0000),
        revision: 2,
        rsdt_address: 0x8_0000,
        xsdt_address: 0x9_0000,
    };
    assert_eq_test!(
        RootTable::select(&info),
        RootTable::Xsdt {
            base: PhysAddr::new(0x9_0000)
        },
        "root table kind"
    );
    pass!()
}

/// Revision >= 2 with a zero extended pointer still means RSDT.
pub fn test_root_table_zero_xsdt_falls_back() -> TestResult {
    let info = RsdpInfo {
        base: PhysAddr::new(0xE0000),
        revision: 2,
        rsdt_address: 0x8_0000,
        xsdt_address: 0,
    };
    assert_eq_test!(
        RootTable::select(&info),
        RootTable::Rsdt {
            base: PhysAddr::new(0x8_0000)
        },
        "root table kind"
    );
    pass!()
}

pub fn test_main_table_preserves_entry_order() -> TestResult {
    let mapper = crate::test_fixtures::standard_platform();
    let acpi = AcpiSubsystem::discover(&mapper);

    let main = match acpi.main_table() {
        Some(main) => main,
        None => return fail!("no main table"),
    };
    let expected = [
        PhysAddr::new(FIXTURE_FADT),
        PhysAddr::new(FIXTURE_SSDT1),
        PhysAddr::new(FIXTURE_HPET),
        PhysAddr::new(FIXTURE_SSDT2),
    ];
    assert_eq_test!(main.entries(), &expected[..], "entry order");
    assert_eq_test!(
        acpi.root_table(),
        Some(RootTable::Xsdt {
            base: PhysAddr::new(FIXTURE_XSDT)
        }),
        "root table"
    );
    pass!()
}

pub fn test_find_table_first_match() -> TestResult {
    let mapper = crate::test_fixtures::standard_platform();
    let acpi = AcpiSubsystem::discover(&mapper);

    assert_eq_test!(
        acpi.find_table(b"HPET"),
        Some(PhysAddr::new(FIXTURE_HPET)),
        "HPET lookup"
    );
    // Two SSDTs exist; the earlier main-table entry wins.
    assert_eq_test!(
        acpi.find_table(b"SSDT"),
        Some(PhysAddr::new(FIXTURE_SSDT1)),
        "first SSDT"
    );
    assert_test!(acpi.find_table(b"TPM2").is_none(), "absent table found");
    pass!()
}

pub fn test_fixed_data_capture() -> TestResult {
    let mapper = crate::test_fixtures::standard_platform();
    let acpi = AcpiSubsystem::discover(&mapper);

    let fixed = match acpi.fixed_data() {
        Some(fixed) => fixed,
        None => return fail!("no fixed platform data"),
    };
    assert_eq_test!(fixed.revision, 2, "FADT revision");
    assert_eq_test!(fixed.sci_interrupt, 9, "SCI interrupt");
    assert_eq_test!(fixed.smi_command, 0xB2, "SMI command port");
    assert_eq_test!(fixed.pm1a_event_block, 0x600, "PM1a event block");
    assert_eq_test!(fixed.century, 0x32, "century register");
    assert_test!(
        fixed.flags.contains(FadtFlags::RESET_REG_SUPPORTED),
        "reset flag lost"
    );
    let reset_port = fixed.reset_register.address;
    assert_eq_test!(reset_port, FIXTURE_RESET_PORT as u64, "reset port");
    assert_eq_test!(fixed.reset_value, FIXTURE_RESET_VALUE, "reset value");
    pass!()
}

pub fn test_dsdt_prefers_extended_pointer() -> TestResult {
    let mapper = crate::test_fixtures::standard_platform();
    let acpi = AcpiSubsystem::discover(&mapper);

    let fixed = match acpi.fixed_data() {
        Some(fixed) => fixed,
        None => return fail!("no fixed platform data"),
    };
    assert_eq_test!(fixed.dsdt(), PhysAddr::new(FIXTURE_X_DSDT), "DSDT pointer");
    pass!()
}

/// Revision-1 firmware has no extended pointer; the 32-bit one is used.
pub fn test_dsdt_legacy_fallback() -> TestResult {
    let mapper = legacy_platform();
    let acpi = AcpiSubsystem::discover(&mapper);

    assert_eq_test!(
        acpi.root_table(),
        Some(RootTable::Rsdt {
            base: PhysAddr::new(FIXTURE_XSDT)
        }),
        "root table"
    );
    let fixed = match acpi.fixed_data() {
        Some(fixed) => fixed,
        None => return fail!("no fixed platform data"),
    };
    assert_eq_test!(
        fixed.dsdt(),
        PhysAddr::new(FIXTURE_LEGACY_DSDT),
        "DSDT pointer"
    );
    pass!()
}

pub fn test_aml_set_order() -> TestResult {
    let mapper = crate::test_fixtures::standard_platform();
    let acpi = AcpiSubsystem::discover(&mapper);

    let expected = [
        PhysAddr::new(FIXTURE_X_DSDT),
        PhysAddr::new(FIXTURE_SSDT1),
        PhysAddr::new(FIXTURE_SSDT2),
    ];
    assert_eq_test!(acpi.aml_tables(), &expected[..], "AML table set");
    pass!()
}

pub fn test_reset_action_requires_revision_two() -> TestResult {
    let mapper = legacy_platform();
    let acpi = AcpiSubsystem::discover(&mapper);
    let fixed = match acpi.fixed_data() {
        Some(fixed) => fixed,
        None => return fail!("no fixed platform data"),
    };
    assert_test!(
        reset_action(fixed).is_none(),
        "revision-1 FADT offered a reset action"
    );
    pass!()
}

pub fn test_reset_action_uses_fadt_register() -> TestResult {
    let mapper = crate::test_fixtures::standard_platform();
    let acpi = AcpiSubsystem::discover(&mapper);
    let fixed = match acpi.fixed_data() {
        Some(fixed) => fixed,
        None => return fail!("no fixed platform data"),
    };
    assert_eq_test!(
        reset_action(fixed),
        Some((FIXTURE_RESET_PORT, FIXTURE_RESET_VALUE)),
        "reset action"
    );
    pass!()
}

/// Full discovery plus follow-up lookups must release every window.
pub fn test_discovery_releases_all_windows() -> TestResult {
    let mapper = crate::test_fixtures::standard_platform();
    let acpi = AcpiSubsystem::discover(&mapper);
    let _ = acpi.find_table(b"HPET");
    let _ = acpi.aml_tables();

    assert_test!(mapper.map_count() > 0, "no mapping happened at all");
    assert_eq_test!(mapper.outstanding(), 0, "windows leaked");
    pass!()
}

define_test_suite!(
    acpi,
    [
        test_rsdp_found_in_ebda,
        test_rsdp_found_in_legacy_area,
        test_missing_rsdp_disables_subsystem,
        test_root_table_revision_zero_selects_rsdt,
        test_root_table_revision_two_selects_xsdt,
        test_root_table_zero_xsdt_falls_back,
        test_main_table_preserves_entry_order,
        test_find_table_first_match,
        test_fixed_data_capture,
        test_dsdt_prefers_extended_pointer,
        test_dsdt_legacy_fallback,
        test_aml_set_order,
        test_reset_action_requires_revision_two,
        test_reset_action_uses_fadt_register,
        test_discovery_releases_all_windows,
    ]
);
