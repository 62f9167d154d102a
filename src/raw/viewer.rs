//! ASCII and binary viewers.
//!
//! Binary files are big-endian. A vector is stored as `[VEC_FILE_CLASSID, N]` followed by its
//! `N` values, a matrix as `[MAT_FILE_CLASSID, M, N, nz]` followed by the `M` row lengths, the
//! `nz` column indices and the `nz` values, all in global row order.
//!
//! In the default mode the first process does all file access and the data of the other
//! processes is sent to or from it. With MPI-IO every process opens the file and accesses
//! its own part at an explicit offset, which all processes advance together.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};

use super::mat::{self, MatAssemblyType, MatData};
use super::vec::{self, VecData};
use super::{check_valid, sys, ClassId, PetscHeader};
use crate::comm::{Communicator, ReduceOp};
use crate::{InsertMode, PetscInt, PetscScalar};

pub(crate) const VEC_FILE_CLASSID: PetscInt = 1211214;
pub(crate) const MAT_FILE_CLASSID: PetscInt = 1211216;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerType {
    PETSCVIEWERASCII,
    PETSCVIEWERBINARY,
}

impl ViewerType {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ViewerType::PETSCVIEWERASCII => "ascii",
            ViewerType::PETSCVIEWERBINARY => "binary",
        }
    }

    pub(crate) fn from_name(name: &str) -> crate::Result<Self> {
        match name {
            "ascii" => Ok(ViewerType::PETSCVIEWERASCII),
            "binary" => Ok(ViewerType::PETSCVIEWERBINARY),
            _ => Err(petsc_err!(ARG_UNKNOWN_TYPE, "Unknown viewer type: {}", name)),
        }
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    FILE_MODE_READ,
    FILE_MODE_WRITE,
    FILE_MODE_APPEND,
    FILE_MODE_UPDATE,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerFormat {
    PETSC_VIEWER_DEFAULT,
    /// Only a summary of the object.
    PETSC_VIEWER_ASCII_INFO,
    /// Matrices are printed as dense rows.
    PETSC_VIEWER_ASCII_DENSE,
    PETSC_VIEWER_NATIVE,
}

/// Types that can be stored in a binary file.
pub trait PetscBinaryData: Copy + Default + Send + 'static {
    /// Size in the file, in bytes.
    const SIZE: usize;

    fn write_be(self, out: &mut Vec<u8>);

    fn read_be(bytes: &[u8]) -> Self;
}

macro_rules! impl_binary_data {
    ($($t:ty),*) => {$(
        impl PetscBinaryData for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn write_be(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }

            fn read_be(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..Self::SIZE]);
                <$t>::from_be_bytes(buf)
            }
        }
    )*};
}

impl_binary_data!(u8, i32, i64, f32, f64);

fn encode<T: PetscBinaryData>(data: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * T::SIZE);
    data.iter().for_each(|v| v.write_be(&mut out));
    out
}

fn decode<T: PetscBinaryData>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::SIZE).map(T::read_be).collect()
}

#[derive(Debug)]
enum Engine {
    Stdout,
    /// Only the first process holds the file.
    AsciiFile(Option<BufWriter<File>>),
    Binary { file: Option<File>, mpiio: bool, offset: u64 },
}

#[derive(Debug, Default)]
pub(crate) struct ViewerData {
    pub(crate) hdr: PetscHeader,
    vtype: Option<ViewerType>,
    mode: Option<FileMode>,
    name: Option<String>,
    formats: Vec<ViewerFormat>,
    skip_header: bool,
    skip_info: bool,
    skip_options: bool,
    use_mpiio: bool,
    engine: RefCell<Option<Engine>>,
}

impl ViewerData {
    pub(crate) fn format(&self) -> ViewerFormat {
        self.formats.last().copied().unwrap_or(ViewerFormat::PETSC_VIEWER_DEFAULT)
    }

    fn vtype(&self) -> crate::Result<ViewerType> {
        check_valid(&self.hdr, "Viewer")?;
        self.vtype.ok_or_else(|| petsc_err!(ARG_TYPENOTSET, "Viewer type not set, call set_type() first"))
    }

    fn check_binary(&self) -> crate::Result<()> {
        match self.vtype()? {
            ViewerType::PETSCVIEWERBINARY => Ok(()),
            t => Err(petsc_err!(SUP, "Only for binary viewers, this viewer is {}", t.name())),
        }
    }

    fn check_not_open(&self) -> crate::Result<()> {
        if self.engine.borrow().is_some() {
            return Err(petsc_err!(ARG_WRONGSTATE, "Viewer file is already open, this must be set before it is used"));
        }
        Ok(())
    }
}

pub(crate) fn create(_comm: &Communicator) -> crate::Result<ViewerData> {
    Ok(ViewerData { hdr: PetscHeader::new(ClassId::Viewer)?, ..Default::default() })
}

pub(crate) fn destroy(v: &mut ViewerData) -> crate::Result<()> {
    let engine = v.engine.get_mut().take();
    *v = ViewerData::default();
    if let Some(Engine::AsciiFile(Some(mut file))) = engine {
        file.flush().map_err(|e| petsc_err!(FILE_WRITE, "Unable to flush viewer file: {}", e))?;
    }
    Ok(())
}

pub(crate) fn set_type(_comm: &Communicator, v: &mut ViewerData, vtype: ViewerType) -> crate::Result<()> {
    check_valid(&v.hdr, "Viewer")?;
    if v.vtype != Some(vtype) {
        v.check_not_open()?;
        v.vtype = Some(vtype);
    }
    Ok(())
}

pub(crate) fn get_type(_comm: &Communicator, v: &ViewerData) -> crate::Result<Option<ViewerType>> {
    check_valid(&v.hdr, "Viewer")?;
    Ok(v.vtype)
}

pub(crate) fn file_set_mode(_comm: &Communicator, v: &mut ViewerData, mode: FileMode) -> crate::Result<()> {
    check_valid(&v.hdr, "Viewer")?;
    v.check_not_open()?;
    v.mode = Some(mode);
    Ok(())
}

pub(crate) fn file_get_mode(_comm: &Communicator, v: &ViewerData) -> crate::Result<Option<FileMode>> {
    check_valid(&v.hdr, "Viewer")?;
    Ok(v.mode)
}

/// Names the file, closing the one that was open.
pub(crate) fn file_set_name(_comm: &Communicator, v: &mut ViewerData, name: &str) -> crate::Result<()> {
    check_valid(&v.hdr, "Viewer")?;
    if let Some(Engine::AsciiFile(Some(mut file))) = v.engine.get_mut().take() {
        file.flush().map_err(|e| petsc_err!(FILE_WRITE, "Unable to flush viewer file: {}", e))?;
    }
    v.name = Some(name.to_string());
    Ok(())
}

pub(crate) fn file_get_name(_comm: &Communicator, v: &ViewerData) -> crate::Result<Option<String>> {
    check_valid(&v.hdr, "Viewer")?;
    Ok(v.name.clone())
}

pub(crate) fn push_format(_comm: &Communicator, v: &mut ViewerData, format: ViewerFormat) -> crate::Result<()> {
    check_valid(&v.hdr, "Viewer")?;
    v.formats.push(format);
    Ok(())
}

pub(crate) fn pop_format(_comm: &Communicator, v: &mut ViewerData) -> crate::Result<()> {
    check_valid(&v.hdr, "Viewer")?;
    v.formats.pop().map(|_| ()).ok_or_else(|| petsc_err!(ARG_WRONGSTATE, "Format stack is empty, too many pops"))
}

pub(crate) fn get_format(_comm: &Communicator, v: &ViewerData) -> crate::Result<ViewerFormat> {
    check_valid(&v.hdr, "Viewer")?;
    Ok(v.format())
}

macro_rules! binary_flag {
    ($($set:ident, $get:ident, $field:ident, $before_open:expr;)*) => {$(
        pub(crate) fn $set(_comm: &Communicator, v: &mut ViewerData, flg: bool) -> crate::Result<()> {
            v.check_binary()?;
            if $before_open {
                v.check_not_open()?;
            }
            v.$field = flg;
            Ok(())
        }

        pub(crate) fn $get(_comm: &Communicator, v: &ViewerData) -> crate::Result<bool> {
            v.check_binary()?;
            Ok(v.$field)
        }
    )*};
}

binary_flag! {
    binary_set_skip_header, binary_get_skip_header, skip_header, false;
    binary_set_skip_info, binary_get_skip_info, skip_info, true;
    binary_set_skip_options, binary_get_skip_options, skip_options, true;
    binary_set_use_mpiio, binary_get_use_mpiio, use_mpiio, true;
}

pub(crate) fn set_from_options(comm: &Communicator, v: &mut ViewerData) -> crate::Result<()> {
    check_valid(&v.hdr, "Viewer")?;
    if let Some(name) = sys::with_options(|db| db.get_string("-viewer_type")) {
        set_type(comm, v, ViewerType::from_name(&name)?)?;
    }
    if v.vtype == Some(ViewerType::PETSCVIEWERBINARY) {
        let flags = sys::with_options(|db| -> crate::Result<_> {
            Ok([db.get_bool("-viewer_binary_skip_header")?, db.get_bool("-viewer_binary_skip_info")?,
                db.get_bool("-viewer_binary_skip_options")?, db.get_bool("-viewer_binary_mpiio")?])
        })?;
        let setters: [fn(&Communicator, &mut ViewerData, bool) -> crate::Result<()>; 4] = [binary_set_skip_header, binary_set_skip_info, binary_set_skip_options, binary_set_use_mpiio];
        for (flg, set) in flags.into_iter().zip(setters) {
            if let Some(flg) = flg {
                set(comm, v, flg)?;
            }
        }
    }
    Ok(())
}

fn open_file(name: &str, mode: FileMode, first: bool, mpiio: bool) -> crate::Result<File> {
    let mut opts = OpenOptions::new();
    match mode {
        FileMode::FILE_MODE_READ => opts.read(true),
        FileMode::FILE_MODE_WRITE => opts.write(true).create(true).truncate(first),
        FileMode::FILE_MODE_APPEND if mpiio => opts.write(true).create(true),
        FileMode::FILE_MODE_APPEND => opts.append(true).create(true),
        FileMode::FILE_MODE_UPDATE => opts.read(true).write(true),
    };
    opts.open(name).map_err(|e| petsc_err!(FILE_OPEN, "Cannot open file {} in mode {:?}: {}", name, mode, e))
}

fn info_name(name: &str) -> String {
    format!("{}.info", name)
}

/// Opens the file behind the viewer. Collective.
fn open(comm: &Communicator, v: &ViewerData) -> crate::Result<Engine> {
    let rank0 = comm.rank() == 0;
    let vtype = v.vtype()?;
    let mode = v.mode;
    match (vtype, &v.name) {
        (ViewerType::PETSCVIEWERASCII, None) => Ok(Engine::Stdout),
        (ViewerType::PETSCVIEWERASCII, Some(name)) => {
            let mode = mode.unwrap_or(FileMode::FILE_MODE_WRITE);
            if mode == FileMode::FILE_MODE_READ {
                return Err(petsc_err!(SUP, "ASCII viewers can not be read from"));
            }
            let file = if rank0 { open_file(name, mode, true, false).map(Some) } else { Ok(None) };
            Ok(Engine::AsciiFile(comm.agree(file)?.map(BufWriter::new)))
        }
        (ViewerType::PETSCVIEWERBINARY, None) => Err(petsc_err!(ARG_WRONGSTATE, "Must call file_set_name() before using a binary viewer")),
        (ViewerType::PETSCVIEWERBINARY, Some(name)) => {
            let mode = mode.ok_or_else(|| petsc_err!(ARG_WRONGSTATE, "Must call file_set_mode() before using a binary viewer"))?;
            let first = if rank0 {
                open_file(name, mode, true, v.use_mpiio).and_then(|file| {
                    if mode == FileMode::FILE_MODE_WRITE && !v.skip_info {
                        File::create(info_name(name))
                            .map_err(|e| petsc_err!(FILE_OPEN, "Cannot open file {}: {}", info_name(name), e))?;
                    }
                    Ok(Some(file))
                })
            } else {
                Ok(None)
            };
            let mut file = comm.agree(first)?;
            let mut offset = 0;
            if v.use_mpiio {
                let rest = if rank0 { Ok(file.take()) } else { open_file(name, mode, false, true).map(Some) };
                file = comm.agree(rest)?;
                if mode == FileMode::FILE_MODE_APPEND {
                    let len = file.as_ref().map(|f| f.metadata().map(|m| m.len()));
                    offset = comm.agree(len.transpose()
                        .map_err(|e| petsc_err!(FILE_READ, "Cannot read length of {}: {}", name, e)))?
                        .unwrap_or(0);
                }
            }
            if mode == FileMode::FILE_MODE_READ && !v.skip_info && !v.skip_options {
                let info = info_name(name);
                let res = if std::path::Path::new(&info).exists() {
                    sys::with_options_mut(|db| db.insert_file(&info)).and_then(|res| res)
                } else {
                    Ok(())
                };
                comm.agree(res)?;
            }
            log::debug!("[{}] opened binary viewer {} ({:?}, mpiio {})", comm.rank(), name, mode, v.use_mpiio);
            Ok(Engine::Binary { file, mpiio: v.use_mpiio, offset })
        }
    }
}

/// Runs `f` on the open engine, opening it first if needed. Collective when the viewer is not
/// open yet.
fn with_engine<R>(comm: &Communicator, v: &ViewerData, f: impl FnOnce(&mut Engine) -> crate::Result<R>) -> crate::Result<R> {
    if v.engine.borrow().is_none() {
        let engine = open(comm, v)?;
        *v.engine.borrow_mut() = Some(engine);
    }
    let mut engine = v.engine.borrow_mut();
    match engine.as_mut() {
        Some(engine) => f(engine),
        None => Err(petsc_err!(PLIB, "viewer engine missing after open")),
    }
}

/// Opens the viewer now rather than at first use. Collective.
pub(crate) fn set_up(comm: &Communicator, v: &ViewerData) -> crate::Result<()> {
    with_engine(comm, v, |_| Ok(()))
}

fn write_at(file: &mut File, pos: Option<u64>, bytes: &[u8]) -> crate::Result<()> {
    let res = match pos {
        Some(pos) => file.seek(SeekFrom::Start(pos)).and_then(|_| file.write_all(bytes)),
        None => file.write_all(bytes),
    };
    res.map_err(|e| petsc_err!(FILE_WRITE, "Write to file failed: {}", e))
}

fn read_at(file: &mut File, pos: Option<u64>, len: usize) -> crate::Result<Vec<u8>> {
    let mut buf = vec![0; len];
    let res = match pos {
        Some(pos) => file.seek(SeekFrom::Start(pos)).and_then(|_| file.read_exact(&mut buf)),
        None => file.read_exact(&mut buf),
    };
    res.map_err(|e| petsc_err!(FILE_READ, "Read from file failed, tried to read {} bytes: {}", len, e))?;
    Ok(buf)
}

fn position(file: &mut File) -> crate::Result<u64> {
    file.stream_position().map_err(|e| petsc_err!(FILE_READ, "Unable to get file position: {}", e))
}

fn seek(file: &mut File, pos: u64) -> crate::Result<()> {
    file.seek(SeekFrom::Start(pos)).map(|_| ()).map_err(|e| petsc_err!(FILE_READ, "Unable to seek: {}", e))
}

fn binary_parts(engine: &mut Engine) -> crate::Result<(&mut Option<File>, bool, &mut u64)> {
    match engine {
        Engine::Binary { file, mpiio, offset } => Ok((file, *mpiio, offset)),
        _ => Err(petsc_err!(SUP, "Only for binary viewers")),
    }
}

/// Writes `data` once. Only the first process writes, but every process must call this
/// with the same data so that MPI-IO offsets stay in step. Collective.
pub(crate) fn binary_write<T: PetscBinaryData>(comm: &Communicator, v: &ViewerData, data: &[T]) -> crate::Result<()> {
    v.check_binary()?;
    let bytes = encode(data);
    let res = with_engine(comm, v, |engine| {
        let (file, mpiio, offset) = binary_parts(engine)?;
        if comm.rank() == 0 {
            if let Some(file) = file.as_mut() {
                write_at(file, mpiio.then(|| *offset), &bytes)?;
            }
        }
        if mpiio {
            *offset += bytes.len() as u64;
        }
        Ok(())
    });
    comm.agree(res)
}

/// Reads `count` items, every process gets the same items. Collective.
pub(crate) fn binary_read<T: PetscBinaryData>(comm: &Communicator, v: &ViewerData, count: usize) -> crate::Result<Vec<T>> {
    v.check_binary()?;
    let len = count * T::SIZE;
    let bytes = with_engine(comm, v, |engine| {
        let (file, mpiio, offset) = binary_parts(engine)?;
        if mpiio {
            let file = file.as_mut().ok_or_else(|| petsc_err!(PLIB, "MPI-IO viewer without a file"))?;
            let res = read_at(file, Some(*offset), len);
            *offset += len as u64;
            comm.agree(res)
        } else {
            let mine = if comm.rank() == 0 {
                Some(match file.as_mut() {
                    Some(file) => read_at(file, None, len).map_err(|e| e.message()),
                    None => Err("file not open".to_string()),
                })
            } else {
                None
            };
            comm.broadcast(0, mine)?.map_err(|msg| petsc_err!(FILE_READ, "{}", msg))
        }
    })?;
    Ok(decode(&bytes))
}

fn resolve_range(comm: &Communicator, count: usize, start: Option<u64>, total: Option<u64>) -> crate::Result<(u64, u64)> {
    let start = match start {
        Some(start) => start,
        None => comm.exclusive_scan(count as u64, ReduceOp::Sum)?.unwrap_or(0),
    };
    let total = match total {
        Some(total) => total,
        None => comm.all_reduce(count as u64, ReduceOp::Sum)?,
    };
    Ok((start, total))
}

/// Writes the `data` of every process, the part of each at item `start` of a block of `total`
/// items. `None` places the parts one after the other in rank order. Collective.
pub(crate) fn binary_write_all<T: PetscBinaryData>(comm: &Communicator, v: &ViewerData, data: &[T],
    start: Option<u64>, total: Option<u64>) -> crate::Result<()>
{
    v.check_binary()?;
    let (start, total) = resolve_range(comm, data.len(), start, total)?;
    let size = T::SIZE as u64;
    let bytes = encode(data);
    let res = with_engine(comm, v, |engine| {
        let (file, mpiio, offset) = binary_parts(engine)?;
        if mpiio {
            let base = *offset;
            *offset += total * size;
            let file = file.as_mut().ok_or_else(|| petsc_err!(PLIB, "MPI-IO viewer without a file"))?;
            return write_at(file, Some(base + start * size), &bytes);
        }
        if let Some(parts) = comm.gather(0, (start, bytes))? {
            let file = file.as_mut().ok_or_else(|| petsc_err!(PLIB, "binary viewer without a file on the first process"))?;
            let base = position(file)?;
            for (start, bytes) in parts {
                write_at(file, Some(base + start * size), &bytes)?;
            }
            seek(file, base + total * size)?;
        }
        Ok(())
    });
    comm.agree(res)
}

/// Reads `count` items on every process, from item `start` of a block of `total` items.
/// Collective.
pub(crate) fn binary_read_all<T: PetscBinaryData>(comm: &Communicator, v: &ViewerData, count: usize,
    start: Option<u64>, total: Option<u64>) -> crate::Result<Vec<T>>
{
    v.check_binary()?;
    let (start, total) = resolve_range(comm, count, start, total)?;
    let size = T::SIZE as u64;
    let bytes = with_engine(comm, v, |engine| {
        let (file, mpiio, offset) = binary_parts(engine)?;
        if mpiio {
            let base = *offset;
            *offset += total * size;
            let res = match file.as_mut() {
                Some(file) => read_at(file, Some(base + start * size), count * T::SIZE),
                None => Err(petsc_err!(PLIB, "MPI-IO viewer without a file")),
            };
            return comm.agree(res);
        }
        let requests = comm.gather(0, (start, count))?;
        let nranks = comm.size() as usize;
        let outgoing: Vec<Result<Vec<u8>, String>> = match (requests, file.as_mut()) {
            (Some(requests), Some(file)) => {
                let parts = position(file).and_then(|base| {
                    let parts = requests.into_iter()
                        .map(|(s, c)| read_at(file, Some(base + s * size), c * T::SIZE).map_err(|e| e.message()))
                        .collect::<Vec<_>>();
                    seek(file, base + total * size).map(|_| parts)
                });
                match parts {
                    Ok(parts) => parts,
                    Err(e) => vec![Err(e.message()); nranks],
                }
            }
            (Some(_), None) => vec![Err("file not open".to_string()); nranks],
            (None, _) => vec![Ok(vec![]); nranks],
        };
        let mut incoming = comm.all_to_all(outgoing)?;
        let res = incoming.swap_remove(0).map_err(|msg| petsc_err!(FILE_READ, "{}", msg));
        comm.agree(res)
    })?;
    Ok(decode(&bytes))
}

pub(crate) fn binary_get_mpiio_offset(comm: &Communicator, v: &ViewerData) -> crate::Result<u64> {
    v.check_binary()?;
    with_engine(comm, v, |engine| match binary_parts(engine)? {
        (_, true, offset) => Ok(*offset),
        _ => Err(petsc_err!(ARG_WRONGSTATE, "Offsets are only kept by MPI-IO viewers")),
    })
}

pub(crate) fn binary_add_mpiio_offset(comm: &Communicator, v: &ViewerData, delta: u64) -> crate::Result<()> {
    v.check_binary()?;
    with_engine(comm, v, |engine| match binary_parts(engine)? {
        (_, true, offset) => {
            *offset += delta;
            Ok(())
        }
        _ => Err(petsc_err!(ARG_WRONGSTATE, "Offsets are only kept by MPI-IO viewers")),
    })
}

/// The file descriptor, on the processes that hold the file.
#[cfg(unix)]
pub(crate) fn binary_get_descriptor(comm: &Communicator, v: &ViewerData) -> crate::Result<std::os::unix::io::RawFd> {
    use std::os::unix::io::AsRawFd;
    v.check_binary()?;
    with_engine(comm, v, |engine| {
        let (file, _, _) = binary_parts(engine)?;
        file.as_ref().map(|f| f.as_raw_fd())
            .ok_or_else(|| petsc_err!(ARG_WRONGSTATE, "Only the first process holds the file unless MPI-IO is used"))
    })
}

fn write_info(comm: &Communicator, v: &ViewerData, line: &str) -> crate::Result<()> {
    if v.skip_info || comm.rank() != 0 || v.mode != Some(FileMode::FILE_MODE_WRITE) {
        return Ok(());
    }
    let name = info_name(v.name.as_deref().unwrap_or_default());
    OpenOptions::new().append(true).create(true).open(&name)
        .and_then(|mut f| f.write_all(line.as_bytes()))
        .map_err(|e| petsc_err!(FILE_WRITE, "Unable to write {}: {}", name, e))
}

fn processes(comm: &Communicator) -> String {
    format!("{} MPI process{}", comm.size(), if comm.size() == 1 { "" } else { "es" })
}

fn fmt_scalar(v: PetscScalar) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}.", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Writes `header` once followed by `body` of every process in rank order. Collective.
pub(crate) fn ascii_write_object(comm: &Communicator, v: &ViewerData, header: &str, body: &str) -> crate::Result<()> {
    if v.vtype()? != ViewerType::PETSCVIEWERASCII {
        return Err(petsc_err!(SUP, "Viewer type {} not supported for this object", v.vtype()?.name()));
    }
    with_engine(comm, v, |_| Ok(()))?;
    let bodies = comm.gather(0, body.to_string())?;
    let res = match bodies {
        Some(bodies) => {
            let text = format!("{}{}", header, bodies.concat());
            with_engine(comm, v, |engine| {
                let res = match engine {
                    Engine::Stdout => {
                        let mut out = std::io::stdout().lock();
                        out.write_all(text.as_bytes()).and_then(|_| out.flush())
                    }
                    Engine::AsciiFile(Some(file)) => file.write_all(text.as_bytes()).and_then(|_| file.flush()),
                    _ => Ok(()),
                };
                res.map_err(|e| petsc_err!(FILE_WRITE, "Unable to write viewer output: {}", e))
            })
        }
        None => Ok(()),
    };
    comm.agree(res)
}

fn check_same_group(comm: &Communicator, seq: bool) -> crate::Result<()> {
    if seq && comm.size() > 1 {
        return Err(petsc_err!(ARG_NOTSAMECOMM, "A sequential object can not be written to a viewer shared by {}", processes(comm)));
    }
    Ok(())
}

pub(crate) fn vec_view(comm: &Communicator, x: &VecData, v: &ViewerData) -> crate::Result<()> {
    let map = x.layout()?;
    match v.vtype()? {
        ViewerType::PETSCVIEWERASCII => {
            let header = format!("Vec Object: {} {}\n  type: {}\n", x.hdr.name(), processes(comm),
                if map.seq || comm.size() == 1 { "seq" } else { "mpi" });
            let mut body = String::new();
            if v.format() != ViewerFormat::PETSC_VIEWER_ASCII_INFO {
                if comm.size() > 1 {
                    body += &format!("Process [{}]\n", comm.rank());
                }
                for &xi in x.local() {
                    body += &fmt_scalar(xi);
                    body.push('\n');
                }
            }
            ascii_write_object(comm, v, &header, &body)
        }
        ViewerType::PETSCVIEWERBINARY => {
            check_same_group(comm, map.seq)?;
            if !v.skip_header {
                binary_write(comm, v, &[VEC_FILE_CLASSID, map.big_n])?;
            }
            binary_write_all(comm, v, x.local(), Some(map.rstart as u64), Some(map.big_n as u64))
        }
    }
}

/// Reads a vector written by [`vec_view`]. A vector without sizes takes the size found in
/// the file and the default split. Collective.
pub(crate) fn vec_load(comm: &Communicator, x: &mut VecData, v: &ViewerData) -> crate::Result<()> {
    check_valid(&x.hdr, "Vec")?;
    v.check_binary()?;
    let big_n = if v.skip_header {
        x.layout()?.big_n
    } else {
        let header = binary_read::<PetscInt>(comm, v, 2)?;
        if header[0] != VEC_FILE_CLASSID {
            return Err(petsc_err!(FILE_UNEXPECTED, "Not a vector next in file, found class id {}", header[0]));
        }
        header[1]
    };
    if x.map.is_none() {
        if x.sizes == (None, None) {
            vec::set_sizes(comm, x, None, Some(big_n))?;
        }
        vec::set_up(comm, x)?;
    }
    let map = x.layout()?.clone();
    if map.big_n != big_n {
        return Err(petsc_err!(ARG_SIZ, "Vector in file has different length ({}) than input vector ({})", big_n, map.big_n));
    }
    check_same_group(comm, map.seq)?;
    let vals = binary_read_all::<PetscScalar>(comm, v, map.n as usize, Some(map.rstart as u64), Some(big_n as u64))?;
    x.local_mut().copy_from_slice(&vals);
    log::debug!("[{}] loaded vector {} of size {}", comm.rank(), x.hdr.name(), big_n);
    Ok(())
}

pub(crate) fn mat_view(comm: &Communicator, m: &MatData, v: &ViewerData) -> crate::Result<()> {
    m.check_assembled()?;
    let (rmap, cmap) = m.layouts()?;
    let local_nz = (0..rmap.n as usize).map(|i| m.row_entries(i).count()).sum::<usize>();
    match v.vtype()? {
        ViewerType::PETSCVIEWERASCII => {
            let nz = comm.all_reduce(local_nz as u64, ReduceOp::Sum)?;
            let type_name = match m.mat_type {
                Some(mat::MatType::MATAIJ) | None => if comm.size() == 1 { "seqaij" } else { "mpiaij" },
                Some(t) => t.name(),
            };
            let header = format!("Mat Object: {} {}\n  type: {}\n", m.hdr.name(), processes(comm), type_name);
            let mut body = String::new();
            match v.format() {
                ViewerFormat::PETSC_VIEWER_ASCII_INFO => {
                    if comm.rank() == 0 {
                        body = format!("  rows={}, cols={}\n  total: nonzeros={}, allocated nonzeros={}\n",
                            rmap.big_n, cmap.big_n, nz, nz);
                    }
                }
                ViewerFormat::PETSC_VIEWER_ASCII_DENSE => {
                    for i in 0..rmap.n as usize {
                        let mut row = vec![0.0; cmap.big_n as usize];
                        m.row_entries(i).for_each(|(c, val)| row[c as usize] = val);
                        let line = row.iter().map(|&val| format!("{:e}", val)).collect::<Vec<_>>().join(" ");
                        body += &line;
                        body.push('\n');
                    }
                }
                _ => {
                    for i in 0..rmap.n as usize {
                        body += &format!("row {}:", rmap.rstart + i as PetscInt);
                        m.row_entries(i).for_each(|(c, val)| body += &format!(" ({}, {}) ", c, fmt_scalar(val)));
                        body.push('\n');
                    }
                }
            }
            ascii_write_object(comm, v, &header, &body)
        }
        ViewerType::PETSCVIEWERBINARY => {
            check_same_group(comm, rmap.seq)?;
            let mut rowlens = Vec::with_capacity(rmap.n as usize);
            let mut cols = Vec::with_capacity(local_nz);
            let mut vals = Vec::with_capacity(local_nz);
            for i in 0..rmap.n as usize {
                let before = cols.len();
                for (c, val) in m.row_entries(i) {
                    cols.push(c);
                    vals.push(val);
                }
                rowlens.push((cols.len() - before) as PetscInt);
            }
            let nz = comm.all_reduce(local_nz as u64, ReduceOp::Sum)?;
            if !v.skip_header {
                binary_write(comm, v, &[MAT_FILE_CLASSID, rmap.big_n, cmap.big_n, nz as PetscInt])?;
            }
            binary_write_all(comm, v, &rowlens, Some(rmap.rstart as u64), Some(rmap.big_n as u64))?;
            binary_write_all(comm, v, &cols, None, Some(nz))?;
            binary_write_all(comm, v, &vals, None, Some(nz))?;
            write_info(comm, v, "-matload_block_size 1\n")
        }
    }
}

/// Reads a matrix written by [`mat_view`] and assembles it. Collective.
pub(crate) fn mat_load(comm: &Communicator, m: &mut MatData, v: &ViewerData) -> crate::Result<()> {
    check_valid(&m.hdr, "Mat")?;
    v.check_binary()?;
    let (big_m, big_n) = if v.skip_header {
        let (rmap, cmap) = m.layouts()?;
        (rmap.big_n, cmap.big_n)
    } else {
        let header = binary_read::<PetscInt>(comm, v, 4)?;
        if header[0] != MAT_FILE_CLASSID {
            return Err(petsc_err!(FILE_UNEXPECTED, "Not a matrix next in file, found class id {}", header[0]));
        }
        (header[1], header[2])
    };
    if m.rmap.is_none() {
        mat::set_sizes(comm, m, None, None, Some(big_m), Some(big_n))?;
        mat::set_up(comm, m)?;
    }
    let (rmap, cmap) = m.layouts()?;
    if rmap.big_n != big_m || cmap.big_n != big_n {
        return Err(petsc_err!(ARG_SIZ, "Matrix in file of size {} x {} does not match the input matrix of size {} x {}",
            big_m, big_n, rmap.big_n, cmap.big_n));
    }
    check_same_group(comm, rmap.seq)?;
    let (rstart, nrows) = (rmap.rstart, rmap.n as usize);

    let rowlens = binary_read_all::<PetscInt>(comm, v, nrows, Some(rstart as u64), Some(big_m as u64))?;
    let bad = rowlens.iter().find(|&&l| l < 0).copied();
    comm.agree(bad.map_or(Ok(()), |l| Err(petsc_err!(FILE_UNEXPECTED, "Negative row length {} in file", l))))?;
    let local_nz = rowlens.iter().map(|&l| l as usize).sum::<usize>();
    let cols = binary_read_all::<PetscInt>(comm, v, local_nz, None, None)?;
    let vals = binary_read_all::<PetscScalar>(comm, v, local_nz, None, None)?;

    let mut res = Ok(());
    let mut at = 0;
    for (i, &len) in rowlens.iter().enumerate() {
        let len = len as usize;
        let row = rstart + i as PetscInt;
        res = mat::set_values(comm, m, &[row], &cols[at..at + len], &vals[at..at + len], InsertMode::INSERT_VALUES);
        if res.is_err() {
            break;
        }
        at += len;
    }
    comm.agree(res)?;
    mat::assembly_begin(comm, m, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    mat::assembly_end(comm, m, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    log::debug!("[{}] loaded {} x {} matrix {}", comm.rank(), big_m, big_n, m.hdr.name());
    Ok(())
}

pub(crate) fn view(comm: &Communicator, v: &ViewerData, viewer: &ViewerData) -> crate::Result<()> {
    check_valid(&v.hdr, "Viewer")?;
    let header = format!("Viewer Object: {} {}\n", v.hdr.name(), processes(comm));
    let mut body = String::new();
    if comm.rank() == 0 {
        body += &format!("  type: {}\n", v.vtype.map_or("not yet set", ViewerType::name));
        if let Some(name) = &v.name {
            body += &format!("  Filename: {}\n", name);
        }
        if let Some(mode) = v.mode {
            body += &format!("  Mode: {:?}\n", mode);
        }
    }
    ascii_write_object(comm, viewer, &header, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(world: &Communicator, name: &str, mode: FileMode, mpiio: bool) -> ViewerData {
        let mut v = create(world).unwrap();
        set_type(world, &mut v, ViewerType::PETSCVIEWERBINARY).unwrap();
        binary_set_use_mpiio(world, &mut v, mpiio).unwrap();
        file_set_mode(world, &mut v, mode).unwrap();
        file_set_name(world, &mut v, name).unwrap();
        v
    }

    #[test]
    fn header_is_big_endian() {
        let dir = std::env::temp_dir().join(format!("petsc-raii-viewer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("header.bin");
        let name = path.to_str().unwrap();

        let world = Communicator::world();
        sys::initialize(0, Default::default()).unwrap();
        let mut v = binary(&world, name, FileMode::FILE_MODE_WRITE, false);
        binary_write(&world, &v, &[1211214i32, 3]).unwrap();
        destroy(&mut v).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, vec![0x00, 0x12, 0x7b, 0x4e, 0, 0, 0, 3]);
        assert!(dir.join("header.bin.info").exists());
    }

    #[test]
    fn parallel_parts_land_in_rank_order() {
        let dir = std::env::temp_dir().join(format!("petsc-raii-viewer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for mpiio in [false, true] {
            let path = dir.join(format!("parts-{}.bin", mpiio));
            let name = path.to_str().unwrap().to_string();
            let written = name.clone();
            let res = crate::comm::run_group(3, move |world| {
                sys::initialize(world.rank(), Default::default()).unwrap();
                let mut v = binary(&world, &written, FileMode::FILE_MODE_WRITE, mpiio);
                let mine = vec![world.rank() as f64; world.rank() as usize + 1];
                binary_write_all(&world, &v, &mine, None, None).unwrap();
                destroy(&mut v).unwrap();

                let mut v = binary(&world, &written, FileMode::FILE_MODE_READ, mpiio);
                let back = binary_read_all::<f64>(&world, &v, mine.len(), None, None).unwrap();
                destroy(&mut v).unwrap();
                back == mine
            });
            assert!(res.into_iter().all(|r| r.unwrap()));
            let bytes = std::fs::read(&name).unwrap();
            let all = decode::<f64>(&bytes);
            assert_eq!(all, vec![0.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        }
    }
}
