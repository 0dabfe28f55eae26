use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    geometry::{Bounds3f, Bounds3i, Point3f, Point3i},
    paramdict::ParameterDictionary,
    parallel::parallel_map,
    sampling::spectrum::{
        BlackbodySpectrum, SampledSpectrum, SampledWavelengths, Spectrum,
    },
    util::Error,
    Float,
};

use super::{cuboid::CuboidProvider, medium::MediumDensity};

/// Edge length of a leaf tile.
const TILE_DIM: i32 = 8;
const TILE_LEN: usize = (TILE_DIM * TILE_DIM * TILE_DIM) as usize;

/// Resolution of the majorant grid built over a sparse grid provider.
const MAJORANT_RES: i32 = 64;

/// A sparse voxel grid of floats: `8^3` leaf tiles over an integer
/// index box, with a uniform index-to-world mapping. Voxels in absent
/// tiles read as zero.
pub struct SparseFloatGrid {
    index_bounds: Bounds3i,
    voxel_size: Float,
    world_origin: Point3f,
    tiles: HashMap<(i32, i32, i32), Box<[Float; TILE_LEN]>>,
}

impl SparseFloatGrid {
    /// Build from a dense block of values with index-space origin
    /// `origin` and extent `(nx, ny, nz)`, laid out x-fastest.
    /// All-zero tiles are dropped.
    pub fn from_dense(
        origin: Point3i,
        (nx, ny, nz): (i32, i32, i32),
        values: &[Float],
        voxel_size: Float,
        world_origin: Point3f,
    ) -> Self {
        assert!(nx > 0 && ny > 0 && nz > 0, "Grid extent should be positive");
        assert!(voxel_size > 0.0, "Voxel size should be positive");
        assert_eq!(
            values.len(),
            (nx * ny * nz) as usize,
            "Grid value count should match its extent"
        );

        let index_bounds = Bounds3i {
            p_min: origin,
            p_max: Point3i::new(origin.x + nx - 1, origin.y + ny - 1, origin.z + nz - 1),
        };
        let mut grid = Self {
            index_bounds,
            voxel_size,
            world_origin,
            tiles: HashMap::new(),
        };

        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let v = values[(x + nx * (y + ny * z)) as usize];
                    if v != 0.0 {
                        grid.set(
                            Point3i::new(origin.x + x, origin.y + y, origin.z + z),
                            v,
                        );
                    }
                }
            }
        }

        grid
    }

    fn set(&mut self, p: Point3i, v: Float) {
        let key = (
            p.x.div_euclid(TILE_DIM),
            p.y.div_euclid(TILE_DIM),
            p.z.div_euclid(TILE_DIM),
        );
        let tile = self
            .tiles
            .entry(key)
            .or_insert_with(|| Box::new([0.0; TILE_LEN]));
        let (ix, iy, iz) = (
            p.x.rem_euclid(TILE_DIM),
            p.y.rem_euclid(TILE_DIM),
            p.z.rem_euclid(TILE_DIM),
        );
        tile[(ix + TILE_DIM * (iy + TILE_DIM * iz)) as usize] = v;
    }

    /// The inclusive box of indices that may hold non-zero voxels.
    pub fn index_bounds(&self) -> Bounds3i {
        self.index_bounds
    }

    /// The world-space box covered by the grid's voxels.
    pub fn world_bounds(&self) -> Bounds3f {
        let lo = self.index_to_world(Point3f::new(
            self.index_bounds.p_min.x as Float,
            self.index_bounds.p_min.y as Float,
            self.index_bounds.p_min.z as Float,
        ));
        // Voxel i covers [i, i + 1) in index space
        let hi = self.index_to_world(Point3f::new(
            (self.index_bounds.p_max.x + 1) as Float,
            (self.index_bounds.p_max.y + 1) as Float,
            (self.index_bounds.p_max.z + 1) as Float,
        ));
        Bounds3f::new(lo, hi)
    }

    pub fn world_to_index(&self, p: Point3f) -> Point3f {
        Point3f::from((p - self.world_origin) / self.voxel_size)
    }

    fn index_to_world(&self, p: Point3f) -> Point3f {
        Point3f::new(
            self.world_origin.x + p.x * self.voxel_size,
            self.world_origin.y + p.y * self.voxel_size,
            self.world_origin.z + p.z * self.voxel_size,
        )
    }

    /// The voxel value at integer index coordinates; zero for voxels in
    /// absent tiles or outside the index box.
    pub fn value(&self, p: Point3i) -> Float {
        let key = (
            p.x.div_euclid(TILE_DIM),
            p.y.div_euclid(TILE_DIM),
            p.z.div_euclid(TILE_DIM),
        );
        match self.tiles.get(&key) {
            None => 0.0,
            Some(tile) => {
                let (ix, iy, iz) = (
                    p.x.rem_euclid(TILE_DIM),
                    p.y.rem_euclid(TILE_DIM),
                    p.z.rem_euclid(TILE_DIM),
                );
                tile[(ix + TILE_DIM * (iy + TILE_DIM * iz)) as usize]
            }
        }
    }

    /// The maximum voxel value over the stored tiles.
    pub fn max_value(&self) -> Float {
        self.tiles
            .values()
            .flat_map(|tile| tile.iter())
            .fold(0.0, |m, &v| m.max(v))
    }

    /// Trilinear point sample at index-space coordinates.
    pub fn sample(&self, p: Point3f) -> Float {
        let pf = p.floor();
        let pi = Point3i::new(pf.x as i32, pf.y as i32, pf.z as i32);
        let d = p - pf;

        let corner =
            |dx: i32, dy: i32, dz: i32| self.value(Point3i::new(pi.x + dx, pi.y + dy, pi.z + dz));
        let lerp = |a: Float, b: Float, t: Float| (1.0 - t) * a + t * b;

        let d00 = lerp(corner(0, 0, 0), corner(1, 0, 0), d.x);
        let d10 = lerp(corner(0, 1, 0), corner(1, 1, 0), d.x);
        let d01 = lerp(corner(0, 0, 1), corner(1, 0, 1), d.x);
        let d11 = lerp(corner(0, 1, 1), corner(1, 1, 1), d.x);

        lerp(
            lerp(d00, d10, d.y),
            lerp(d01, d11, d.y),
            d.z,
        )
    }
}

impl fmt::Debug for SparseFloatGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseFloatGrid")
            .field("index_bounds", &self.index_bounds)
            .field("voxel_size", &self.voxel_size)
            .field("world_origin", &self.world_origin)
            .field("tiles", &self.tiles.len())
            .finish()
    }
}

const GRID_FILE_MAGIC: &[u8; 4] = b"SPGR";
const GRID_FILE_VERSION: u32 = 1;

/// Write named sparse grids to `path` in the tiled binary format.
pub fn write_grids(path: &Path, grids: &[(&str, &SparseFloatGrid)]) -> Result<(), Error> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(GRID_FILE_MAGIC);
    bytes.extend_from_slice(&GRID_FILE_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(grids.len() as u32).to_le_bytes());

    for (name, grid) in grids {
        bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&(grid.voxel_size as f64).to_le_bytes());
        for c in 0..3 {
            bytes.extend_from_slice(&(grid.world_origin[c] as f64).to_le_bytes());
        }
        for p in [grid.index_bounds.p_min, grid.index_bounds.p_max] {
            for c in 0..3 {
                bytes.extend_from_slice(&p[c].to_le_bytes());
            }
        }
        bytes.extend_from_slice(&(grid.tiles.len() as u32).to_le_bytes());
        for (key, tile) in &grid.tiles {
            bytes.extend_from_slice(&(key.0 * TILE_DIM).to_le_bytes());
            bytes.extend_from_slice(&(key.1 * TILE_DIM).to_le_bytes());
            bytes.extend_from_slice(&(key.2 * TILE_DIM).to_le_bytes());
            for v in tile.iter() {
                bytes.extend_from_slice(&(*v as f32).to_le_bytes());
            }
        }
    }

    fs::write(path, bytes).map_err(|source| Error::GridIo {
        path: path.to_path_buf(),
        source,
    })
}

struct GridReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    path: &'a Path,
}

impl<'a> GridReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.cursor + n > self.bytes.len() {
            return Err(self.malformed("unexpected end of file"));
        }
        let slice = &self.bytes[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::GridFormat {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Read every named grid from a tiled binary grid file.
pub fn read_grids(path: &Path) -> Result<HashMap<String, SparseFloatGrid>, Error> {
    let bytes = fs::read(path).map_err(|source| Error::GridIo {
        path: path.to_path_buf(),
        source,
    })?;
    let mut r = GridReader {
        bytes: &bytes,
        cursor: 0,
        path,
    };

    if r.take(4)? != GRID_FILE_MAGIC {
        return Err(r.malformed("bad magic"));
    }
    let version = r.read_u32()?;
    if version != GRID_FILE_VERSION {
        return Err(r.malformed(format!("unsupported version {version}")));
    }

    let grid_count = r.read_u32()?;
    let mut grids = HashMap::new();
    for _ in 0..grid_count {
        let name_len = r.read_u16()? as usize;
        let name = std::str::from_utf8(r.take(name_len)?)
            .map_err(|_| r.malformed("grid name is not UTF-8"))?
            .to_string();

        let voxel_size = r.read_f64()? as Float;
        if voxel_size <= 0.0 || !voxel_size.is_finite() {
            return Err(r.malformed("voxel size should be positive"));
        }
        let world_origin = Point3f::new(
            r.read_f64()? as Float,
            r.read_f64()? as Float,
            r.read_f64()? as Float,
        );
        let p_min = Point3i::new(r.read_i32()?, r.read_i32()?, r.read_i32()?);
        let p_max = Point3i::new(r.read_i32()?, r.read_i32()?, r.read_i32()?);
        if p_max.x < p_min.x || p_max.y < p_min.y || p_max.z < p_min.z {
            return Err(r.malformed("inverted index bounds"));
        }

        let mut grid = SparseFloatGrid {
            index_bounds: Bounds3i { p_min, p_max },
            voxel_size,
            world_origin,
            tiles: HashMap::new(),
        };

        let tile_count = r.read_u32()?;
        for _ in 0..tile_count {
            let ox = r.read_i32()?;
            let oy = r.read_i32()?;
            let oz = r.read_i32()?;
            if ox.rem_euclid(TILE_DIM) != 0
                || oy.rem_euclid(TILE_DIM) != 0
                || oz.rem_euclid(TILE_DIM) != 0
            {
                return Err(r.malformed("tile origin is not tile-aligned"));
            }
            let mut tile = Box::new([0.0 as Float; TILE_LEN]);
            for v in tile.iter_mut() {
                *v = r.read_f32()? as Float;
            }
            grid.tiles.insert(
                (
                    ox.div_euclid(TILE_DIM),
                    oy.div_euclid(TILE_DIM),
                    oz.div_euclid(TILE_DIM),
                ),
                tile,
            );
        }

        grids.insert(name, grid);
    }

    Ok(grids)
}

/// Spatially varying density from a sparse voxel grid, with optional
/// blackbody emission driven by a temperature grid.
#[derive(Debug)]
pub struct SparseGridMediumProvider {
    bounds: Bounds3f,
    density_grid: SparseFloatGrid,
    temperature_grid: Option<SparseFloatGrid>,
    le_scale: Float,
    temperature_cutoff: Float,
    temperature_scale: Float,
    single_majorant: bool,
}

impl SparseGridMediumProvider {
    pub fn new(
        density_grid: SparseFloatGrid,
        temperature_grid: Option<SparseFloatGrid>,
        le_scale: Float,
        temperature_cutoff: Float,
        temperature_scale: Float,
        single_majorant: bool,
    ) -> Self {
        let mut bounds = density_grid.world_bounds();
        if let Some(temperature) = &temperature_grid {
            bounds = bounds.union(temperature.world_bounds());
        }

        Self {
            bounds,
            density_grid,
            temperature_grid,
            le_scale,
            temperature_cutoff,
            temperature_scale,
            single_majorant,
        }
    }

    pub fn create(params: &ParameterDictionary) -> Result<Self, Error> {
        let filename = params.get_one_string("filename", "")?;
        if filename.is_empty() {
            return Err(params.error("filename", "a grid file path is required"));
        }

        let mut grids = read_grids(Path::new(&filename))?;
        let density_grid = grids.remove("density").ok_or_else(|| Error::GridFormat {
            path: PathBuf::from(&filename),
            reason: "no \"density\" grid present".to_string(),
        })?;
        let temperature_grid = grids.remove("temperature");

        let le_scale = params.get_one_float("Lescale", 1.0)?;
        let temperature_cutoff = params.get_one_float("temperaturecutoff", 0.0)?;
        let temperature_scale = params.get_one_float("temperaturescale", 1.0)?;
        let single_majorant = params.get_one_bool("singlemajorant", false)?;

        Ok(Self::new(
            density_grid,
            temperature_grid,
            le_scale,
            temperature_cutoff,
            temperature_scale,
            single_majorant,
        ))
    }
}

impl CuboidProvider for SparseGridMediumProvider {
    fn bounds(&self) -> Bounds3f {
        self.bounds
    }

    fn is_emissive(&self) -> bool {
        self.temperature_grid.is_some() && self.le_scale > 0.0
    }

    fn density(&self, p: Point3f, _lambda: &SampledWavelengths) -> MediumDensity {
        let d = self.density_grid.sample(self.density_grid.world_to_index(p));
        MediumDensity::uniform(d)
    }

    fn le(&self, p: Point3f, lambda: &SampledWavelengths) -> SampledSpectrum {
        let Some(temperature_grid) = &self.temperature_grid else {
            return SampledSpectrum::with_single_value(0.0);
        };

        let temp = temperature_grid.sample(temperature_grid.world_to_index(p));
        let temp = (temp - self.temperature_cutoff) * self.temperature_scale;
        if temp <= 100.0 {
            return SampledSpectrum::with_single_value(0.0);
        }

        BlackbodySpectrum::new(temp).sample(lambda) * self.le_scale
    }

    fn max_density_grid(&self) -> (Vec<Float>, Point3i) {
        if self.single_majorant {
            // One medium-wide cell bounding the whole grid
            return (
                vec![self.density_grid.max_value()],
                Point3i::new(1, 1, 1),
            );
        }

        let res = Point3i::new(MAJORANT_RES, MAJORANT_RES, MAJORANT_RES);
        debug!("starting sparse grid majorant build at {res:?}");

        let bounds = self.bounds;
        let grid = &self.density_grid;
        let index_bounds = grid.index_bounds();
        let max_grid = parallel_map((res.x * res.y * res.z) as usize, |index| {
            let x = index as i32 % res.x;
            let y = (index as i32 / res.x) % res.y;
            let z = index as i32 / (res.x * res.y);

            // World-space bounds of this majorant cell
            let wb = Bounds3f::new(
                bounds.lerp(Point3f::new(
                    x as Float / res.x as Float,
                    y as Float / res.y as Float,
                    z as Float / res.z as Float,
                )),
                bounds.lerp(Point3f::new(
                    (x + 1) as Float / res.x as Float,
                    (y + 1) as Float / res.y as Float,
                    (z + 1) as Float / res.z as Float,
                )),
            );

            // Index-space bounds, expanded by a voxel of filter slop
            // and clamped to the grid's active box
            let i0 = grid.world_to_index(wb.p_min);
            let i1 = grid.world_to_index(wb.p_max);
            let delta: Float = 1.0;
            let nx0 = ((i0.x - delta) as i32).max(index_bounds.p_min.x);
            let nx1 = ((i1.x + delta) as i32).min(index_bounds.p_max.x);
            let ny0 = ((i0.y - delta) as i32).max(index_bounds.p_min.y);
            let ny1 = ((i1.y + delta) as i32).min(index_bounds.p_max.y);
            let nz0 = ((i0.z - delta) as i32).max(index_bounds.p_min.z);
            let nz1 = ((i1.z + delta) as i32).min(index_bounds.p_max.z);

            let mut max_value: Float = 0.0;
            for nz in nz0..=nz1 {
                for ny in ny0..=ny1 {
                    for nx in nx0..=nx1 {
                        max_value = max_value.max(grid.value(Point3i::new(nx, ny, nz)));
                    }
                }
            }

            max_value
        });

        debug!("finished sparse grid majorant build");
        (max_grid, res)
    }
}

impl fmt::Display for SparseGridMediumProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ SparseGridMediumProvider bounds: {:?} LeScale: {} temperatureCutoff: {} \
             temperatureScale: {} (grids elided) ]",
            self.bounds, self.le_scale, self.temperature_cutoff, self.temperature_scale
        )
    }
}
