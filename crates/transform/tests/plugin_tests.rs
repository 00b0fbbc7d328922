//! Plugins run against synthetic netCDF and GeoTIFF files.

use cog_common::{BoundingBox, NODATA_SENTINEL, WGS84_EPSG};
use grid_processor::Raster;
use test_utils::fixtures::{bbox, geotiff, goes, time};
use test_utils::{lat_centers, lon_centers, NetCdfFixture};
use transform::{plugin_by_name, SourceFile, TransformError};

const NODATA: f32 = NODATA_SENTINEL;

fn run(plugin: &str, name: &str, bytes: Vec<u8>, nodata: f32) -> transform::TransformOutput {
    plugin_by_name(plugin)
        .unwrap()
        .transform(&SourceFile::new(name, bytes), nodata)
        .unwrap()
}

fn only(outputs: &transform::TransformOutput, key: &str) -> Raster {
    outputs
        .get(key)
        .unwrap_or_else(|| panic!("missing {key}, have {:?}", outputs.keys().collect::<Vec<_>>()))
        .clone()
}

// ============================================================================
// Coordinate normalization and nodata
// ============================================================================

#[test]
fn test_geos_oco2_wraps_longitude_flips_rows_and_harmonizes_nodata() {
    let provider_nodata = 1.0e15_f32;
    let mut xco2: Vec<f32> = (0..8).map(|i| i as f32).collect();
    xco2[1] = provider_nodata;

    let bytes = NetCdfFixture::new()
        .coordinate("time", vec![5479.0])
        .attr("time", "units", time::DAYS_SINCE_2000)
        .coordinate("lat", lat_centers(2))
        .coordinate("lon", lon_centers(4, 0.0))
        .variable("XCO2", &["time", "lat", "lon"], xco2)
        .attr("XCO2", "units", "mol mol-1")
        .variable("XCO2PREC", &["time", "lat", "lon"], vec![0.5; 8])
        .to_bytes();

    let outputs = run(
        "geos_oco2",
        "oco2_GEOS_L3CO2_day_20150101_B10206Ar.nc4",
        bytes,
        provider_nodata,
    );
    assert_eq!(outputs.len(), 2);

    let raster = only(&outputs, "oco2_GEOS_XCO2_L3CO2_day_B10206Ar_20150101.tif");
    assert_eq!(raster.x, vec![-135.0, -45.0, 45.0, 135.0]);
    assert_eq!(raster.y, vec![45.0, -45.0]);
    assert_eq!(raster.data, vec![6.0, 7.0, 4.0, 5.0, 2.0, 3.0, 0.0, NODATA]);
    assert_eq!(raster.nodata, Some(NODATA));
    assert_eq!(raster.crs.epsg(), WGS84_EPSG);
    assert_eq!(raster.attributes.get("units").map(String::as_str), Some("mol mol-1"));

    assert!(outputs.contains_key("oco2_GEOS_XCO2PREC_L3CO2_day_B10206Ar_20150101.tif"));
}

#[test]
fn test_fill_value_becomes_harmonized_sentinel() {
    let bytes = NetCdfFixture::new()
        .coordinate("lat", lat_centers(2))
        .coordinate("lon", lon_centers(2, -180.0))
        .variable("xch4", &["lat", "lon"], vec![1.0, -1.0, 3.0, 4.0])
        .fill_value("xch4", -1.0)
        .to_bytes();

    let outputs = run("gosat_ch4", "GOSAT_CH4_2019_07.nc", bytes, NODATA);
    let raster = outputs.values().next().unwrap();
    // North-up: the second latitude row comes first.
    assert_eq!(raster.data, vec![3.0, 4.0, 1.0, NODATA]);
}

#[test]
fn test_ecco_darwin_rescales_index_grid() {
    let bytes = NetCdfFixture::new()
        .dimension("time", 1)
        .dimension("y", 3)
        .dimension("x", 4)
        .variable("XC", &["y", "x"], vec![0.0; 12])
        .variable("YC", &["y", "x"], vec![0.0; 12])
        .variable("CO2_FLUX", &["time", "y", "x"], (0..12).map(|i| i as f32).collect())
        .to_bytes();

    let outputs = run("ecco_darwin", "CO2_flux_2020_01.nc", bytes, NODATA);
    assert_eq!(outputs.len(), 1);

    let raster = only(&outputs, "CO2_flux_202001.tif");
    assert_eq!(raster.x, vec![-180.0, -179.75, -179.5, -179.25]);
    assert!(raster.is_north_up());
    assert!((raster.y[2] + 90.0).abs() < 1e-9);
    // Rows reversed: the last index row is now first.
    assert_eq!(&raster.data[..4], &[8.0, 9.0, 10.0, 11.0]);
}

// ============================================================================
// Derived layers
// ============================================================================

#[test]
fn test_epa_sector_layers_sum_members() {
    let mut fixture = NetCdfFixture::new()
        .coordinate("lat", lat_centers(2))
        .coordinate("lon", lon_centers(2, -180.0));
    for i in 0..27 {
        let value = (i + 1) as f32 * 1.0e6;
        fixture = fixture.variable(&format!("emi_ch4_{i:02}"), &["lat", "lon"], vec![value; 4]);
    }

    let outputs = run(
        "epa_ch4emission",
        "Express_Extension_Gridded_GHGI_Methane_v2_2020.nc",
        fixture.to_bytes(),
        NODATA,
    );
    assert_eq!(outputs.len(), 7);

    let coal = only(&outputs, "Express_Extension_coal-mines_Gridded_GHGI_Methane_v2_2020.tif");
    assert_eq!(coal.data, vec![12.0; 4]);

    let other = only(&outputs, "Express_Extension_other_Gridded_GHGI_Methane_v2_2020.tif");
    assert_eq!(other.data, vec![46.0; 4]);

    let all = only(&outputs, "Express_Extension_all-variables_Gridded_GHGI_Methane_v2_2020.tif");
    assert_eq!(all.data, vec![351.0; 4]);
}

#[test]
fn test_epa_requires_full_variable_set() {
    let bytes = NetCdfFixture::new()
        .coordinate("lat", lat_centers(2))
        .coordinate("lon", lon_centers(2, -180.0))
        .variable("emi_ch4_00", &["lat", "lon"], vec![1.0; 4])
        .to_bytes();

    let err = plugin_by_name("epa_ch4emission")
        .unwrap()
        .transform(
            &SourceFile::new("Gridded_GHGI_Methane_v2_2020.nc", bytes),
            NODATA,
        )
        .unwrap_err();
    assert!(matches!(err, TransformError::MissingData { .. }));
}

// ============================================================================
// GeoTIFF sources
// ============================================================================

#[test]
fn test_odiac_masks_zero_cells() {
    let mut source = test_utils::create_test_raster(16, 8);
    source.data[0] = 0.0;
    let bytes = geotiff::to_bytes(&source);

    let outputs = run("odiac_ffco2_v2024", "odiac2024_1km_excl_intl_202201.tif", bytes, NODATA);
    let raster = only(&outputs, "odiac2024_1km_excl_intl_202201.tif");
    assert_eq!(raster.data[0], NODATA);
    assert_eq!(raster.data[1], source.data[1]);
    assert_eq!((raster.width, raster.height), (16, 8));
}

#[test]
fn test_gpw_keeps_values() {
    let source = test_utils::create_test_raster(16, 8);
    let bytes = geotiff::to_bytes(&source);

    let outputs = run(
        "gpw",
        "gpw_v4_population_density_rev11_2020_30_sec.tif",
        bytes,
        NODATA,
    );
    let raster = only(&outputs, "gpw_v4_population_density_rev11_2020_30_sec_2020.tif");
    assert_eq!(raster.data, source.data);
    assert_eq!(raster.crs.epsg(), WGS84_EPSG);
}

// ============================================================================
// GOES fixed grid
// ============================================================================

#[test]
fn test_goes_radf_reprojects_and_clips() {
    let (nx, ny) = (40, 24);
    let bytes = goes::radiance(nx, ny).to_bytes();

    let outputs = run(
        "goes_radf",
        "OR_ABI-L1b-RadF-M6C08_G16_s20241810600208_e20241810609516_c20241810609566.nc",
        bytes,
        NODATA,
    );
    let raster = only(&outputs, "G16ABI_M6C08_2024-06-29T06:00:20Z.tif");

    let (min_x, min_y, max_x, max_y) = bbox::AMERICAS;
    let aoi = BoundingBox::new(min_x, min_y, max_x, max_y);
    assert!(raster.x.iter().all(|&x| x >= aoi.min_x && x <= aoi.max_x));
    assert!(raster.y.iter().all(|&y| y >= aoi.min_y && y <= aoi.max_y));
    assert!(raster.is_north_up());
    assert_eq!(raster.nodata, Some(NODATA));

    let limit = (nx * ny) as f32;
    assert!(raster.data.iter().all(|&v| v == NODATA || (0.0..limit).contains(&v)));
    assert!(raster.data.iter().any(|&v| v != NODATA));
}

#[test]
fn test_goes_radf_c08_names_from_scan_start() {
    let bytes = goes::radiance(20, 12).to_bytes();
    let outputs = run(
        "goes_radf_c08",
        "OR_ABI-L1b-RadF-M6C08_G16_s20241810600208_e20241810609516_c20241810609566.nc",
        bytes,
        NODATA,
    );
    assert!(outputs.contains_key("G16ABI_M6C08_2024-06-29T06:00:00Z.tif"));
}

// ============================================================================
// Monthly and yearly model outputs
// ============================================================================

#[test]
fn test_tm54dvar_writes_each_month_and_skips_global_totals() {
    let provider_nodata = -1.0e34_f32;
    let mut fossil: Vec<f32> = (0..16).map(|i| i as f32).collect();
    fossil[9] = provider_nodata;

    let bytes = NetCdfFixture::new()
        .dimension("months", 2)
        .coordinate("latitude", lat_centers(2))
        .coordinate("longitude", lon_centers(4, 0.0))
        .variable("fossil", &["months", "latitude", "longitude"], fossil)
        .attr("fossil", "units", "mg m-2 day-1")
        .variable("global_fossil", &["months", "latitude", "longitude"], vec![1.0; 16])
        .variable("total", &["months"], vec![5.0, 6.0])
        .to_bytes();

    let outputs = run(
        "tm54dvar_ch4flux",
        "tm5/methane_emis_mask_monthgrid_2015.nc",
        bytes,
        provider_nodata,
    );
    assert_eq!(
        outputs.keys().collect::<Vec<_>>(),
        vec![
            "methane_emis_fossil_mask_monthgrid_201501.tif",
            "methane_emis_fossil_mask_monthgrid_201502.tif",
        ]
    );

    let january = only(&outputs, "methane_emis_fossil_mask_monthgrid_201501.tif");
    assert_eq!(january.x, vec![-135.0, -45.0, 45.0, 135.0]);
    assert_eq!(january.data, vec![6.0, 7.0, 4.0, 5.0, 2.0, 3.0, 0.0, 1.0]);

    let february = only(&outputs, "methane_emis_fossil_mask_monthgrid_201502.tif");
    assert_eq!(
        february.data,
        vec![14.0, 15.0, 12.0, 13.0, 10.0, 11.0, 8.0, NODATA]
    );
    assert_eq!(february.nodata, Some(NODATA));
    assert_eq!(february.attributes.get("units").map(String::as_str), Some("mg m-2 day-1"));
}

#[test]
fn test_tm54dvar_requires_months_dimension() {
    let bytes = NetCdfFixture::new()
        .coordinate("lat", lat_centers(2))
        .coordinate("lon", lon_centers(2, -180.0))
        .variable("fossil", &["lat", "lon"], vec![1.0; 4])
        .to_bytes();

    let err = plugin_by_name("tm54dvar_ch4flux")
        .unwrap()
        .transform(&SourceFile::new("methane_emis_2015.nc", bytes), NODATA)
        .unwrap_err();
    assert!(matches!(err, TransformError::MissingData { .. }));
}

#[test]
fn test_casagfed_decodes_dates_and_drops_time_bounds() {
    let bytes = NetCdfFixture::new()
        .coordinate("time", vec![1096.0, 1127.0])
        .attr("time", "units", time::DAYS_SINCE_2000)
        .dimension("nv", 2)
        .coordinate("lat", lat_centers(2))
        .coordinate("lon", lon_centers(2, -180.0))
        .variable("NPP", &["time", "lat", "lon"], (0..8).map(|i| i as f32).collect())
        .variable("Rh", &["time", "lat", "lon"], vec![2.0; 8])
        .variable("time_bnds", &["time", "nv"], vec![1096.0, 1127.0, 1127.0, 1155.0])
        .to_bytes();

    let outputs = run(
        "casagfed_carbonflux",
        "GEOSCarb_CASAGFED3v3_Flux.Monthly.x720_y360.2003.nc",
        bytes,
        NODATA,
    );
    assert_eq!(
        outputs.keys().collect::<Vec<_>>(),
        vec![
            "GEOSCarb_CASAGFED3v3_NPP_Flux_Monthly_x720_y360_200301.tif",
            "GEOSCarb_CASAGFED3v3_NPP_Flux_Monthly_x720_y360_200302.tif",
            "GEOSCarb_CASAGFED3v3_Rh_Flux_Monthly_x720_y360_200301.tif",
            "GEOSCarb_CASAGFED3v3_Rh_Flux_Monthly_x720_y360_200302.tif",
        ]
    );

    let npp = only(&outputs, "GEOSCarb_CASAGFED3v3_NPP_Flux_Monthly_x720_y360_200302.tif");
    assert_eq!(npp.data, vec![6.0, 7.0, 4.0, 5.0]);
    assert_eq!(npp.y, vec![45.0, -45.0]);
}

#[test]
fn test_lpjwsl_scales_values_and_names_month_from_raw_time() {
    let provider_nodata = -1.0_f32;
    let mut ch4 = vec![0.5, provider_nodata, 0.25, 0.125];
    ch4.extend([1.0; 4]);

    let bytes = NetCdfFixture::new()
        .coordinate("time", vec![0.0, 732.0 * 6.0])
        .attr("time", "units", "hours since 1700-01-01")
        .coordinate("lat", lat_centers(2))
        .coordinate("lon", lon_centers(2, -180.0))
        .variable("ch4", &["time", "lat", "lon"], ch4)
        .to_bytes();

    let outputs = run(
        "lpjwsl_wetlandch4",
        "LPJ_wsl_CH4_emissions_2020.nc",
        bytes,
        provider_nodata,
    );
    assert_eq!(outputs.len(), 2);

    let january = only(&outputs, "LPJ_wsl_ch4_CH4_emissions_202001.tif");
    assert_eq!(january.data, vec![250.0, 125.0, 500.0, NODATA]);
    assert_eq!(january.nodata, Some(NODATA));

    let july = only(&outputs, "LPJ_wsl_ch4_CH4_emissions_202007.tif");
    assert_eq!(july.data, vec![1000.0; 4]);
}

#[test]
fn test_cmip6_names_by_year_and_wraps_longitude() {
    let provider_nodata = 1.0e20_f32;
    let mut tmax: Vec<f32> = (0..16).map(|i| i as f32).collect();
    tmax[2] = provider_nodata;

    let bytes = NetCdfFixture::new()
        .coordinate("time", vec![181.0, 547.0])
        .attr("time", "units", "days since 2015-01-01")
        .coordinate("lat", lat_centers(2))
        .coordinate("lon", lon_centers(4, 0.0))
        .variable("tmaxXF", &["time", "lat", "lon"], tmax)
        .to_bytes();

    let outputs = run(
        "cmip6_climdex",
        "climdex/tmaxXF/ACCESS-CM2/tmaxXF_ACCESS-CM2_ssp245_2015.nc",
        bytes,
        provider_nodata,
    );
    assert_eq!(
        outputs.keys().collect::<Vec<_>>(),
        vec![
            "tmaxXF_ACCESS-CM2_ssp245_2015_tmaxXF.tif",
            "tmaxXF_ACCESS-CM2_ssp245_2016_tmaxXF.tif",
        ]
    );

    let first = only(&outputs, "tmaxXF_ACCESS-CM2_ssp245_2015_tmaxXF.tif");
    assert_eq!(first.x, vec![-135.0, -45.0, 45.0, 135.0]);
    assert_eq!(first.data, vec![6.0, 7.0, 4.0, 5.0, NODATA, 3.0, 0.0, 1.0]);

    let second = only(&outputs, "tmaxXF_ACCESS-CM2_ssp245_2016_tmaxXF.tif");
    assert_eq!(&second.data[..4], &[14.0, 15.0, 12.0, 13.0]);
}

#[test]
fn test_ceos_shifts_latitude_and_skips_grid_variables() {
    let bytes = NetCdfFixture::new()
        .coordinate("dimy", vec![45.0, 135.0])
        .coordinate("dimx", vec![90.0, 270.0])
        .variable("area", &["dimy", "dimx"], vec![9.0; 4])
        .variable("mask", &["dimy", "dimx"], vec![1.0; 4])
        .variable("prior", &["dimy", "dimx"], vec![1.0, 2.0, 3.0, 4.0])
        .variable("post", &["dimy", "dimx"], vec![5.0, NODATA, 7.0, 8.0])
        .to_bytes();

    let outputs = run(
        "ceos_ch4budget",
        "CH4-inverse-flux/MethaneFlux_2019.nc",
        bytes,
        NODATA,
    );
    assert_eq!(
        outputs.keys().collect::<Vec<_>>(),
        vec!["MethaneFlux_2019_post.tif", "MethaneFlux_2019_prior.tif"]
    );

    let prior = only(&outputs, "MethaneFlux_2019_prior.tif");
    assert_eq!(prior.y, vec![45.0, -45.0]);
    assert_eq!(prior.x, vec![-90.0, 90.0]);
    assert_eq!(prior.data, vec![4.0, 3.0, 2.0, 1.0]);
    assert!(prior.is_north_up());
}

#[test]
fn test_odiac_2022_takes_year_from_folder() {
    let provider_nodata = -1.0_f32;
    let mut source = test_utils::create_test_raster(16, 8);
    source.data[0] = provider_nodata;
    source.data[1] = 0.0;
    let bytes = geotiff::to_bytes(&source);

    let outputs = run(
        "odiac_ffco2_v2022",
        "ODIAC/2022/odiac2022_1km_excl_intl_2201.tif",
        bytes.clone(),
        provider_nodata,
    );
    let raster = only(&outputs, "odiac2022_1km_excl_intl_202201.tif");
    assert_eq!(raster.data[0], NODATA);
    // Zero cells are kept in this release.
    assert_eq!(raster.data[1], 0.0);
    assert_eq!(raster.data[2], source.data[2]);

    let err = plugin_by_name("odiac_ffco2_v2022")
        .unwrap()
        .transform(
            &SourceFile::new("odiac2022_1km_excl_intl_2201.tif", bytes),
            provider_nodata,
        )
        .unwrap_err();
    assert!(matches!(err, TransformError::Filename { .. }));
}
